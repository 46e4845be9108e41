pub mod chrome;
pub mod group_list;
pub mod search_bar;
pub mod settings_list;
pub mod snapshot_viewer;
pub mod status_bar;
pub mod value_editor;

use crate::app::Effect;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use std::any::Any;

pub trait Widget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64);
    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let _ = key;
        Vec::new()
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

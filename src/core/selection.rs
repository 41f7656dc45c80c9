//! Session selection state
//!
//! Tracks the active command and the active pattern, and mirrors every
//! write into the catalogs that drive suggestion lists.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::event::Pattern;

/// Catalog that highlights the command currently in use
pub trait CommandCatalog {
    fn set_active_command(&mut self, command: &str);
}

/// Catalog that highlights the pattern currently in use
pub trait PatternCatalog {
    fn set_active_pattern(&mut self, pattern: &Pattern);
}

/// Shared single-value slot.
///
/// The session writes into its copy, presentation keeps a clone and reads.
#[derive(Debug)]
pub struct CatalogSlot<T> {
    value: Rc<RefCell<Option<T>>>,
}

impl<T> Clone for CatalogSlot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> Default for CatalogSlot<T> {
    fn default() -> Self {
        Self {
            value: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T: Clone> CatalogSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    fn set(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
    }
}

impl CommandCatalog for CatalogSlot<String> {
    fn set_active_command(&mut self, command: &str) {
        self.set(command.to_string());
    }
}

impl PatternCatalog for CatalogSlot<Pattern> {
    fn set_active_pattern(&mut self, pattern: &Pattern) {
        self.set(pattern.clone());
    }
}

/// What the user currently has selected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    active_command: Option<String>,
    active_pattern: Option<Pattern>,
}

impl SelectionState {
    pub fn active_command(&self) -> Option<&str> {
        self.active_command.as_deref()
    }

    pub fn active_pattern(&self) -> Option<&Pattern> {
        self.active_pattern.as_ref()
    }

    /// Store `command` verbatim and forward it to the catalog
    pub fn select_active_command(&mut self, command: &str, catalog: &mut dyn CommandCatalog) {
        debug!("active command: {:?}", command);
        self.active_command = Some(command.to_string());
        catalog.set_active_command(command);
    }

    pub fn select_pattern(&mut self, pattern: Pattern, catalog: &mut dyn PatternCatalog) {
        debug!("active pattern: {}", pattern.id);
        catalog.set_active_pattern(&pattern);
        self.active_pattern = Some(pattern);
    }
}

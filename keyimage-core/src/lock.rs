//! The global "interacting with a tool" flag.
//!
//! Exactly one tool may be modifying an annotation at a time. The flag lives
//! on the UI thread, starts clear, and is only set and cleared through
//! [`InteractionLock`], which the tool acquires when it activates its modify
//! listeners and drops when it deactivates them.

use std::cell::Cell;

use crate::{ToolError, ToolResult};

thread_local! {
    static INTERACTING: Cell<bool> = const { Cell::new(false) };
}

/// Whether any tool on this thread is mid-interaction.
#[must_use]
pub fn is_interacting_with_tool() -> bool {
    INTERACTING.with(Cell::get)
}

/// Proof of holding the interaction flag. Dropping it clears the flag.
#[derive(Debug)]
pub struct InteractionLock {
    _private: (),
}

impl InteractionLock {
    /// Set the flag.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InteractionInProgress`] if another holder exists.
    pub fn acquire() -> ToolResult<Self> {
        INTERACTING.with(|flag| {
            if flag.replace(true) {
                Err(ToolError::InteractionInProgress)
            } else {
                Ok(Self { _private: () })
            }
        })
    }
}

impl Drop for InteractionLock {
    fn drop(&mut self) {
        INTERACTING.with(|flag| {
            debug_assert!(flag.get(), "interaction flag cleared twice");
            flag.set(false);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_writer() {
        assert!(!is_interacting_with_tool());

        let lock = InteractionLock::acquire().expect("first acquire");
        assert!(is_interacting_with_tool());
        assert!(matches!(
            InteractionLock::acquire(),
            Err(ToolError::InteractionInProgress)
        ));

        drop(lock);
        assert!(!is_interacting_with_tool());
        assert!(InteractionLock::acquire().is_ok());
    }
}

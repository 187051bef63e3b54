/// Operator requests waiting for the next tick. Each kind has a single slot:
/// repeated requests before a tick collapse into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandSlot {
    emergency_stop: bool,
    start: bool,
}

/// What a tick found in the slot. Whatever the tick does not act on is lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCommands {
    pub emergency_stop: bool,
    pub start: bool,
}

impl CommandSlot {
    pub fn push_emergency_stop(&mut self) {
        self.emergency_stop = true;
    }

    pub fn push_start(&mut self) {
        self.start = true;
    }

    pub fn is_empty(&self) -> bool {
        !self.emergency_stop && !self.start
    }

    pub fn peek(&self) -> PendingCommands {
        PendingCommands {
            emergency_stop: self.emergency_stop,
            start: self.start,
        }
    }

    pub fn drain(&mut self) -> PendingCommands {
        let pending = self.peek();
        *self = CommandSlot::default();
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_slot() {
        let mut slot = CommandSlot::default();
        slot.push_start();
        slot.push_start();
        slot.push_emergency_stop();
        assert_eq!(
            slot.drain(),
            PendingCommands {
                emergency_stop: true,
                start: true
            }
        );
        assert!(slot.is_empty());
        assert_eq!(slot.drain(), PendingCommands::default());
    }
}

/// Agent lifecycle states (spec §4.5): `init → running → draining → terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Running,
    Draining,
    Terminated,
}

/// Tracks the agent's coarse lifecycle phase. Transitions are driven externally by the
/// first dispatch tick and by the shutdown signal; this type only records and validates
/// them, it doesn't schedule anything itself.
pub struct Lifecycle {
    state: LifecycleState,
    logger: slog::Logger,
}

impl Lifecycle {
    pub fn new(logger: slog::Logger) -> Self {
        Self {
            state: LifecycleState::Init,
            logger,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Called after the first successful dispatch tick.
    pub fn mark_running(&mut self) {
        if self.state == LifecycleState::Init {
            self.state = LifecycleState::Running;
            slog::info!(self.logger, "lifecycle transition"; "to" => "running");
        }
    }

    /// Called when a shutdown signal is observed; the caller still owes the lifecycle one
    /// best-effort final dispatch before calling `mark_terminated`.
    pub fn mark_draining(&mut self) {
        self.state = LifecycleState::Draining;
        slog::info!(self.logger, "lifecycle transition"; "to" => "draining");
    }

    pub fn mark_terminated(&mut self) {
        self.state = LifecycleState::Terminated;
        slog::info!(self.logger, "lifecycle transition"; "to" => "terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_init_and_advances_in_order() {
        let mut lifecycle = Lifecycle::new(slog::Logger::root(slog::Discard, slog::o!()));
        assert_eq!(lifecycle.state(), LifecycleState::Init);

        lifecycle.mark_running();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        lifecycle.mark_draining();
        assert_eq!(lifecycle.state(), LifecycleState::Draining);

        lifecycle.mark_terminated();
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    }

    #[test]
    fn mark_running_is_a_no_op_once_past_init() {
        let mut lifecycle = Lifecycle::new(slog::Logger::root(slog::Discard, slog::o!()));
        lifecycle.mark_draining();
        lifecycle.mark_running();
        assert_eq!(lifecycle.state(), LifecycleState::Draining);
    }
}

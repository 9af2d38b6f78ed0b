#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayLifecycle {
    Starting,
    Running,
    Stopping,
    Stopped,
}

pub fn can_transition(from: OverlayLifecycle, to: OverlayLifecycle) -> bool {
    matches!(
        (from, to),
        (OverlayLifecycle::Starting, OverlayLifecycle::Running)
            | (OverlayLifecycle::Starting, OverlayLifecycle::Stopping)
            | (OverlayLifecycle::Starting, OverlayLifecycle::Stopped)
            | (OverlayLifecycle::Running, OverlayLifecycle::Stopping)
            | (OverlayLifecycle::Running, OverlayLifecycle::Stopped)
            | (OverlayLifecycle::Stopping, OverlayLifecycle::Stopped)
    ) || from == to
}

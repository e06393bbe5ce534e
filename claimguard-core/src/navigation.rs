//! Navigation command issued when a session is forcibly ended.

/// Host navigation hook.
///
/// The manager only issues the command; routing itself belongs to the host.
pub trait Navigator: Send + Sync {
    /// Replace the current route with the login entry route.
    fn reset_to_login(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn reset_to_login(&self) {
        self()
    }
}

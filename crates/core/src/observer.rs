/// Receives solver events and optionally returns a control action.
///
/// Solvers call [`Observer::observe`] after each step they accept. Returning
/// `None` lets the solver continue; returning `Some(action)` asks it to react,
/// for example by stopping early.
///
/// Closures of the form `FnMut(&E) -> Option<A>` are observers, and `()` is
/// the observer that ignores every event.
pub trait Observer<E, A> {
    /// Observes a solver event.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

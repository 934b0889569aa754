use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

static NEXT_HOOK_ID: AtomicUsize = AtomicUsize::new(0);

/// Unique hook identifier used to unregister commit/destruction hooks
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HookId(usize);

pub(super) struct Hook<T: ?Sized> {
    pub id: HookId,
    pub cb: Arc<T>,
}

impl<T: ?Sized> fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T: ?Sized> Clone for Hook<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cb: self.cb.clone(),
        }
    }
}

impl<T: ?Sized> Hook<T> {
    pub fn new(cb: Arc<T>) -> Self {
        Self {
            id: HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed)),
            cb,
        }
    }
}

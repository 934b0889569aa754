//! Type map used to attach arbitrary data to seats and surfaces

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A storage able to hold one value of each type
///
/// Values can only be inserted, never removed, and are handed out as [`Arc`]s so they can be
/// used without holding the map's lock.
#[derive(Default)]
pub struct UserDataMap {
    list: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for UserDataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.list.lock().map(|list| list.len()).unwrap_or_default();
        f.debug_struct("UserDataMap").field("entries", &len).finish()
    }
}

impl UserDataMap {
    /// Create a new map
    pub fn new() -> UserDataMap {
        UserDataMap::default()
    }

    /// Attempt to access the stored value of type `T`
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let list = self.list.lock().unwrap();
        list.iter().find_map(|value| value.clone().downcast::<T>().ok())
    }

    /// Access the value of type `T`, inserting the result of `init` first if there is none
    pub fn get_or_insert_threadsafe<T: Send + Sync + 'static, F: FnOnce() -> T>(&self, init: F) -> Arc<T> {
        let mut list = self.list.lock().unwrap();
        if let Some(value) = list.iter().find_map(|value| value.clone().downcast::<T>().ok()) {
            return value;
        }
        let value = Arc::new(init());
        list.push(value.clone());
        value
    }
}

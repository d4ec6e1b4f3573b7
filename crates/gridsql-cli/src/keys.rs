//! Key source shared between the statement reader, prompts and the grid

use gridsql_edit::{KeySource, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to one underlying key source
#[derive(Clone)]
pub struct SharedKeys(Arc<Mutex<Box<dyn KeySource + Send>>>);

impl SharedKeys {
    pub fn new(source: impl KeySource + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(source))))
    }
}

impl KeySource for SharedKeys {
    fn get_key(&mut self) -> Result<String> {
        self.0.lock().get_key()
    }

    fn read_line(&mut self) -> Result<String> {
        self.0.lock().read_line()
    }
}

use std::sync::Arc;

use mcsc_agent::ServerController;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ServerController>,
}

impl AppState {
    pub fn new(controller: ServerController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }
}

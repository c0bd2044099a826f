//! Mock construction helpers

use flowgraph::pipeline::{
    ExecutionStatus, NodeConfig, NodeModule, NodeType, SocketReader, SocketWriter,
};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Module {}

    impl NodeModule for Module {
        fn module_name(&self) -> String;
        fn ensure_initialized(&self) -> bool;
    }
}

pub const DEVICE_MODULE: &str = "device";

/// Module named `DEVICE_MODULE` whose initialization reports `ready`.
pub fn device_module(ready: bool) -> MockModule {
    let mut module = MockModule::new();
    module
        .expect_module_name()
        .return_const(DEVICE_MODULE.to_string());
    module.expect_ensure_initialized().return_const(ready);
    module
}

/// Node type that declares `DEVICE_MODULE` and remembers whether it got it.
#[derive(Default)]
pub struct DeviceNode {
    pub module: Option<Arc<dyn NodeModule>>,
}

impl NodeType for DeviceNode {
    fn configuration(&self) -> NodeConfig {
        NodeConfig::new("Runs on the device").with_module(DEVICE_MODULE)
    }

    fn execute(&mut self, _reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
        match &self.module {
            Some(module) => ExecutionStatus::info(format!("using {}", module.module_name())),
            None => ExecutionStatus::error("module not attached"),
        }
    }

    fn attach_module(&mut self, module: Arc<dyn NodeModule>) {
        self.module = Some(module);
    }
}

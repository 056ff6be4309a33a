pub mod catalog;
pub mod graph;
pub mod report;
pub mod stage;
pub mod stages;

pub use catalog::WorkflowCatalog;
pub use graph::definition::{
    branching_workflow, linear_workflow, EdgeSpec, NodeSpec, WorkflowBuilder, WorkflowDefinition,
};
pub use graph::executor::WorkflowEngine;
pub use graph::runner::{NodeRun, NodeRunner};
pub use report::build_response;
pub use stage::{Stage, StageInput};
pub use stages::StageRegistry;

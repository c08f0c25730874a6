pub mod call_dag;
pub mod complexity;
pub mod dependency_graph;
pub mod hashing;
pub mod limitations;
pub mod outputs;
pub mod packer;
pub mod timing;
pub mod variables;

pub use call_dag::{CallDag, CallDepthError, FunctionRecord};
pub use complexity::{limit_expression_complexity, max_tree_depth};
pub use dependency_graph::{DependencyGraph, GraphNode, GraphNodeId, GraphNodeKind};
pub use hashing::{HASHED_NAME_PREFIX, NameHasher, NameMap};
pub use limitations::validate_limitations;
pub use outputs::validate_outputs;
pub use packer::{
    check_variables_within_packing_limits, check_varyings_within_packing_limits, expand_variables,
};
pub use timing::{restrict_fragment_shader_timing, restrict_vertex_shader_timing};
pub use variables::{InterfaceBlockInfo, ShaderVariable, ShaderVariables, collect_variables};

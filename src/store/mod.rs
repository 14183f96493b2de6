pub mod error;
pub mod graph;
pub mod metadata;

pub use error::StoreError;
pub use graph::{
    Consistency, GraphStore, RelationshipFilter, RelationshipTuple, ResourceRef, SpiceDbGraphStore,
    SubjectRef,
};
pub use metadata::{MetadataStore, MetadataTx, PostgresMetadataStore, RoleRow};

//! Core data model for testforge
//!
//! This crate is the foundation of the workspace: every other crate consumes
//! these types and none of them redefines pipeline data shapes locally.
//! Values here are plain data; construction happens in the loader and the
//! sectioner, and nothing mutates an [`ApiSpec`] or a [`Section`] after it is
//! built.

mod artifact;
mod section;
mod spec;

pub mod csv;

pub use artifact::{
    ArtifactFragment, ConsolidatedArtifact, CsvTable, FormatKind, FragmentContent, KarateFeature,
    KarateSuite, PostmanCollection, PostmanFolder, PostmanInfo, PostmanItem, PostmanRequest,
    PostmanVariable, POSTMAN_SCHEMA_V2_1,
};
pub use section::{Section, SectionId, StrategyKind};
pub use spec::{ApiSpec, Endpoint, HttpMethod, Parameter, SchemaDefinition};

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod forms;
pub mod gateway;
pub mod ids;
pub mod model;
pub mod presenter;
pub mod query;
pub mod state;
pub mod sync;
pub mod values;

pub use forms::*;
pub use gateway::*;
pub use ids::*;
pub use model::*;
pub use presenter::*;
pub use query::*;
pub use state::*;
pub use sync::*;
pub use values::*;

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod areas;

pub use areas::{Area, AreaHolder, MAX_AREAS_IN_RESULT};

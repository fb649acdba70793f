// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — validation, page counting, and page rasterization.

pub mod rasterize;
pub mod reader;

pub use rasterize::{PageRasterizer, PdftoppmRasterizer};
pub use reader::PdfReader;

// SPDX-License-Identifier: GPL-3.0-only
pub mod details;
pub mod naming;
pub mod service;
pub mod structure;
pub mod view;

pub use details::MapDetails;
pub use naming::MapNameValidation;
pub use service::MapService;
pub use view::MapView;

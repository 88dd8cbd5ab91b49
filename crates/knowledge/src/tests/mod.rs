//! Cross-module scenarios with in-process collaborators.

mod support;

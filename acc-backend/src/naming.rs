//! Label and scope naming
//!
//! Names are stored symbolically: a derived name is its owner scope's name
//! plus a suffix and is rendered on demand. Renaming a subroutine therefore
//! renames every label and nested subroutine derived from it without any
//! bookkeeping.

use crate::ir::{LabelId, ScopeId};
use crate::scope::Builder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Name {
    Fixed(String),
    Derived { owner: ScopeId, suffix: String },
}

#[derive(Debug, Clone)]
pub(crate) struct LabelData {
    pub(crate) name: Name,
    pub(crate) defined: bool,
}

impl Builder {
    pub(crate) fn render_name(&self, name: &Name) -> String {
        let mut suffixes: Vec<&str> = Vec::new();
        let mut current = name;
        // Owners are always created before the names derived from them.
        loop {
            match current {
                Name::Fixed(base) => {
                    let mut rendered = base.clone();
                    for suffix in suffixes.iter().rev() {
                        rendered.push_str(suffix);
                    }
                    return rendered;
                }
                Name::Derived { owner, suffix } => {
                    suffixes.push(suffix.as_str());
                    current = &self.scopes[owner.0].name;
                }
            }
        }
    }

    pub fn scope_name(&self, scope: ScopeId) -> String {
        self.render_name(&self.scopes[scope.0].name)
    }

    pub fn label_name(&self, label: LabelId) -> String {
        self.render_name(&self.labels[label.0].name)
    }

    pub fn rename_scope(&mut self, scope: ScopeId, name: impl Into<String>) {
        self.scopes[scope.0].name = Name::Fixed(name.into());
    }

    pub(crate) fn rename_label(&mut self, label: LabelId, name: impl Into<String>) {
        self.labels[label.0].name = Name::Fixed(name.into());
    }

    /// A label named after `owner`, following it through renames.
    pub fn label_with_suffix(&mut self, owner: ScopeId, suffix: impl Into<String>) -> LabelId {
        self.new_label(Name::Derived { owner, suffix: suffix.into() })
    }

    /// Change the suffix of a label derived from its owner.
    pub(crate) fn set_label_suffix(&mut self, label: LabelId, suffix: &str) {
        if let Name::Derived { suffix: current, .. } = &mut self.labels[label.0].name {
            *current = suffix.to_string();
        }
    }
}

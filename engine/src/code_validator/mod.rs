//! Static code validation for plugin sources
//!
//! Parses a plugin's Rust source into a syntax tree and walks every node,
//! rejecting:
//!
//! - `use` and `extern crate` items whose top-level crate is not in the
//!   import allow-list (`crate`, `self` and `super` always pass)
//! - calls and method calls whose name is in the call deny-list
//! - `unsafe` blocks, functions, impls and traits (when `deny_unsafe` is on)
//!
//! Source that fails to parse is rejected too.
//!
//! # Limitations
//!
//! This is a syntactic gate against accidental misuse, not a sandbox. A
//! determined author can get past it: fully qualified paths need no `use`
//! (`std::process::Command::new`), macros are not expanded, and anything
//! built reflectively at runtime is invisible here. Real isolation needs a
//! process boundary or a capability-restricted runtime.
//!
//! The loader scans only a plugin's `src/lib.rs`. Modules it pulls in with
//! `mod foo;` are covered by the checksum but are never scanned.

use crate::config::ValidatorConfig;
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::visit::{self, Visit};
use syn::{Expr, ExprCall, ExprMethodCall, ExprUnsafe, Ident, ItemExternCrate, ItemImpl, ItemTrait, ItemUse, Signature, UseTree};
use warden_sdk::errors::SecurityError;

/// Crates plugins may import by default: the SDK, serialization, the web
/// framework, the ORM and the validation library
pub const DEFAULT_ALLOWED_IMPORTS: &[&str] = &["warden_sdk", "serde", "serde_json", "axum", "sqlx", "validator"];

/// Call names rejected by default: dynamic execution, evaluation and
/// dynamic library loading
pub const DEFAULT_BLOCKED_CALLS: &[&str] = &["exec", "eval", "system", "dlopen", "dlsym"];

/// Path roots that refer to the plugin's own crate
const RELATIVE_ROOTS: &[&str] = &["crate", "self", "super"];

/// Syntax-tree scanner for plugin sources
#[derive(Debug, Clone)]
pub struct CodeValidator {
    allowed_imports: HashSet<String>,
    blocked_calls: HashSet<String>,
    deny_unsafe: bool,
}

impl CodeValidator {
    /// Create a validator with explicit lists
    pub fn new<A, B, S, T>(allowed_imports: A, blocked_calls: B, deny_unsafe: bool) -> Self
    where
        A: IntoIterator<Item = S>,
        B: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            allowed_imports: allowed_imports.into_iter().map(Into::into).collect(),
            blocked_calls: blocked_calls.into_iter().map(Into::into).collect(),
            deny_unsafe,
        }
    }

    /// Validate plugin source text
    ///
    /// # Errors
    ///
    /// Returns the first violation in traversal order:
    /// `UnparseableSource`, `DisallowedImport`, `BlockedCall` or `UnsafeCode`.
    pub fn validate(&self, source: &str) -> Result<(), SecurityError> {
        let file = syn::parse_file(source)
            .map_err(|e| SecurityError::UnparseableSource(e.to_string()))?;

        let mut scanner = Scanner {
            rules: self,
            violation: None,
        };
        scanner.visit_file(&file);

        match scanner.violation {
            Some(violation) => {
                tracing::debug!("Static validation rejected source: {}", violation);
                Err(violation)
            }
            None => Ok(()),
        }
    }

    fn import_allowed(&self, root: &str) -> bool {
        RELATIVE_ROOTS.contains(&root) || self.allowed_imports.contains(root)
    }

    fn call_blocked(&self, name: &str) -> bool {
        self.blocked_calls.contains(name)
    }
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_IMPORTS.iter().copied(),
            DEFAULT_BLOCKED_CALLS.iter().copied(),
            true,
        )
    }
}

impl From<&ValidatorConfig> for CodeValidator {
    fn from(config: &ValidatorConfig) -> Self {
        Self::new(
            config.allowed_imports.iter().cloned(),
            config.blocked_calls.iter().cloned(),
            config.deny_unsafe,
        )
    }
}

/// Visitor that records the first violation it meets
struct Scanner<'a> {
    rules: &'a CodeValidator,
    violation: Option<SecurityError>,
}

impl Scanner<'_> {
    fn flag(&mut self, violation: SecurityError) {
        if self.violation.is_none() {
            self.violation = Some(violation);
        }
    }

    fn check_import(&mut self, root: &Ident) {
        let root = root.unraw().to_string();
        if !self.rules.import_allowed(&root) {
            self.flag(SecurityError::DisallowedImport(root));
        }
    }

    fn check_use_tree(&mut self, tree: &UseTree) {
        match tree {
            UseTree::Path(path) => self.check_import(&path.ident),
            UseTree::Name(name) => self.check_import(&name.ident),
            UseTree::Rename(rename) => self.check_import(&rename.ident),
            UseTree::Glob(_) => self.flag(SecurityError::DisallowedImport("*".to_string())),
            UseTree::Group(group) => {
                for item in &group.items {
                    self.check_use_tree(item);
                }
            }
        }
    }

    fn check_call(&mut self, name: &Ident) {
        let name = name.unraw().to_string();
        if self.rules.call_blocked(&name) {
            self.flag(SecurityError::BlockedCall(name));
        }
    }

    fn check_unsafe(&mut self, is_unsafe: bool) {
        if is_unsafe && self.rules.deny_unsafe {
            self.flag(SecurityError::UnsafeCode);
        }
    }
}

impl<'ast> Visit<'ast> for Scanner<'_> {
    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        self.check_use_tree(&node.tree);
        visit::visit_item_use(self, node);
    }

    fn visit_item_extern_crate(&mut self, node: &'ast ItemExternCrate) {
        self.check_import(&node.ident);
        visit::visit_item_extern_crate(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(callee) = node.func.as_ref() {
            if let Some(last) = callee.path.segments.last() {
                self.check_call(&last.ident);
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        self.check_call(&node.method);
        visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_unsafe(&mut self, node: &'ast ExprUnsafe) {
        self.check_unsafe(true);
        visit::visit_expr_unsafe(self, node);
    }

    fn visit_signature(&mut self, node: &'ast Signature) {
        self.check_unsafe(node.unsafety.is_some());
        visit::visit_signature(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        self.check_unsafe(node.unsafety.is_some());
        visit::visit_item_impl(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast ItemTrait) {
        self.check_unsafe(node.unsafety.is_some());
        visit::visit_item_trait(self, node);
    }
}

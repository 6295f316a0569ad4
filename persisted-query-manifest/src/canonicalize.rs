//! Canonicalization of a single operation: fragment resolution through the
//! global registry, the optional caller-supplied transform, `__typename`
//! completion, then the shared deterministic ordering and printing.

use std::collections::HashMap;
use std::collections::HashSet;

use apollo_compiler::ast;
use apollo_compiler::name;
use apollo_compiler::Name;
use apollo_compiler::Node;
use persisted_query_lists::canonical_print;
use persisted_query_lists::OperationType;
use thiserror::Error;

use crate::loader::DocumentSource;

/// All discovered fragment definitions, keyed by name. Built once per
/// generation run and shared by reference across every operation, so spreads
/// resolve the same way no matter which file they appear in.
#[derive(Debug, Default)]
pub(crate) struct FragmentRegistry {
    fragments: HashMap<Name, Node<ast::FragmentDefinition>>,
}

impl FragmentRegistry {
    pub(crate) fn from_sources<'a>(
        sources: impl IntoIterator<Item = &'a DocumentSource>,
    ) -> Self {
        let mut registry = Self::default();
        for source in sources {
            let Some(document) = &source.document else {
                continue;
            };
            for definition in &document.definitions {
                if let ast::Definition::FragmentDefinition(fragment) = definition {
                    registry
                        .fragments
                        .insert(fragment.name.clone(), fragment.clone());
                }
            }
        }
        registry
    }

    /// Collect the fragments an operation transitively depends on, in
    /// discovery order (the canonical sort happens later).
    fn fragments_for(
        &self,
        operation: &ast::OperationDefinition,
    ) -> Result<Vec<Node<ast::FragmentDefinition>>, CanonicalizeError> {
        let mut needed = vec![];
        let mut seen: HashSet<Name> = HashSet::new();
        let mut pending = vec![];

        collect_spreads(&operation.selection_set, &mut pending);

        while let Some(spread_name) = pending.pop() {
            if !seen.insert(spread_name.clone()) {
                continue;
            }
            let fragment = self.fragments.get(&spread_name).ok_or_else(|| {
                CanonicalizeError::UnknownFragment {
                    name: spread_name.to_string(),
                }
            })?;
            collect_spreads(&fragment.selection_set, &mut pending);
            needed.push(fragment.clone());
        }

        Ok(needed)
    }
}

fn collect_spreads(selections: &[ast::Selection], pending: &mut Vec<Name>) {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => collect_spreads(&field.selection_set, pending),
            ast::Selection::InlineFragment(inline) => {
                collect_spreads(&inline.selection_set, pending)
            }
            ast::Selection::FragmentSpread(spread) => pending.push(spread.fragment_name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    #[error(r#"Unknown fragment "{name}"."#)]
    UnknownFragment { name: String },
}

/// A canonicalized operation, ready for identification.
#[derive(Debug, Clone)]
pub(crate) struct CanonicalOperation {
    pub(crate) body: String,
    pub(crate) operation_type: OperationType,
}

/// Settings shared by every operation in a run.
pub(crate) struct Canonicalizer<'a> {
    pub(crate) fragments: &'a FragmentRegistry,
    pub(crate) document_transform:
        Option<&'a (dyn Fn(ast::Document) -> ast::Document + Send + Sync)>,
    pub(crate) add_typename: bool,
}

impl Canonicalizer<'_> {
    /// The fixed canonicalization pipeline: fragment resolution, optional
    /// transform, `__typename` completion, deterministic sort, print.
    pub(crate) fn canonicalize(
        &self,
        operation: &Node<ast::OperationDefinition>,
    ) -> Result<CanonicalOperation, CanonicalizeError> {
        let mut document = ast::Document::new();
        document.definitions.push(operation.clone().into());
        document.definitions.extend(
            self.fragments
                .fragments_for(operation)?
                .into_iter()
                .map(Into::into),
        );

        if let Some(transform) = self.document_transform {
            document = transform(document);
        }

        if self.add_typename {
            add_typename(&mut document);
        }

        Ok(CanonicalOperation {
            body: canonical_print(&document),
            operation_type: operation.operation_type.into(),
        })
    }
}

/// Append a `__typename` selection to every selection set except operation
/// roots, mirroring client-side cache normalization. Selection sets that
/// already select an introspection (`__`-prefixed) field are left alone.
pub(crate) fn add_typename(document: &mut ast::Document) {
    for definition in &mut document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => {
                // The operation root itself is not completed.
                for selection in &mut operation.make_mut().selection_set {
                    complete_selection(selection);
                }
            }
            ast::Definition::FragmentDefinition(fragment) => {
                complete_selection_set(&mut fragment.make_mut().selection_set);
            }
            _ => {}
        }
    }
}

fn complete_selection(selection: &mut ast::Selection) {
    match selection {
        ast::Selection::Field(field) => {
            if !field.selection_set.is_empty() {
                complete_selection_set(&mut field.make_mut().selection_set);
            }
        }
        ast::Selection::InlineFragment(inline) => {
            complete_selection_set(&mut inline.make_mut().selection_set);
        }
        ast::Selection::FragmentSpread(_) => {}
    }
}

fn complete_selection_set(selections: &mut Vec<ast::Selection>) {
    for selection in selections.iter_mut() {
        complete_selection(selection);
    }

    let selects_introspection_field = selections.iter().any(|selection| {
        matches!(
            selection,
            ast::Selection::Field(field) if field.name.as_str().starts_with("__")
        )
    });
    if !selects_introspection_field {
        selections.push(ast::Selection::Field(Node::new(ast::Field {
            alias: None,
            name: name!("__typename"),
            arguments: Vec::new(),
            directives: ast::DirectiveList::default(),
            selection_set: Vec::new(),
        })));
    }
}

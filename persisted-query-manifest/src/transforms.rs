//! Document transforms for use with
//! [`PersistedQueryManifestConfig::document_transform`](crate::PersistedQueryManifestConfig)
//! or on their own: hiding literal values and removing field aliases.

use apollo_compiler::ast;
use apollo_compiler::Node;

/// Replace numeric, string, list, and object literals with "empty" values.
/// Enum values are left alone (there is no consistent "zero" enum). This can
/// help combine similar queries when values are substituted directly into
/// queries rather than passed as GraphQL variables, and keeps hardcoded
/// sensitive data out of the manifest.
pub fn hide_literals(mut document: ast::Document) -> ast::Document {
    rewrite_literals(&mut document, true);
    document
}

/// Like [`hide_literals`], but only hides the sensitive (string and numeric)
/// literals. List and object literals are preserved unless
/// `hide_list_and_object_literals` is set; their string and numeric elements
/// are hidden either way.
pub fn strip_sensitive_literals(
    mut document: ast::Document,
    hide_list_and_object_literals: bool,
) -> ast::Document {
    rewrite_literals(&mut document, hide_list_and_object_literals);
    document
}

/// Remove field aliases, under which a server returns a field's data with a
/// different name from the field name.
pub fn remove_aliases(mut document: ast::Document) -> ast::Document {
    for definition in &mut document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => {
                strip_aliases(&mut operation.make_mut().selection_set);
            }
            ast::Definition::FragmentDefinition(fragment) => {
                strip_aliases(&mut fragment.make_mut().selection_set);
            }
            _ => {}
        }
    }
    document
}

fn strip_aliases(selections: &mut Vec<ast::Selection>) {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                let field = field.make_mut();
                field.alias = None;
                strip_aliases(&mut field.selection_set);
            }
            ast::Selection::InlineFragment(inline) => {
                strip_aliases(&mut inline.make_mut().selection_set);
            }
            ast::Selection::FragmentSpread(_) => {}
        }
    }
}

fn rewrite_literals(document: &mut ast::Document, hide_lists_and_objects: bool) {
    for definition in &mut document.definitions {
        match definition {
            ast::Definition::OperationDefinition(operation) => {
                let operation = operation.make_mut();
                for variable in operation.variables.iter_mut() {
                    let variable = variable.make_mut();
                    if let Some(default_value) = variable.default_value.as_mut() {
                        rewrite_value(default_value, hide_lists_and_objects);
                    }
                    rewrite_directives(&mut variable.directives, hide_lists_and_objects);
                }
                rewrite_directives(&mut operation.directives, hide_lists_and_objects);
                rewrite_selections(&mut operation.selection_set, hide_lists_and_objects);
            }
            ast::Definition::FragmentDefinition(fragment) => {
                let fragment = fragment.make_mut();
                rewrite_directives(&mut fragment.directives, hide_lists_and_objects);
                rewrite_selections(&mut fragment.selection_set, hide_lists_and_objects);
            }
            _ => {}
        }
    }
}

fn rewrite_selections(selections: &mut Vec<ast::Selection>, hide_lists_and_objects: bool) {
    for selection in selections {
        match selection {
            ast::Selection::Field(field) => {
                let field = field.make_mut();
                for argument in field.arguments.iter_mut() {
                    rewrite_value(&mut argument.make_mut().value, hide_lists_and_objects);
                }
                rewrite_directives(&mut field.directives, hide_lists_and_objects);
                rewrite_selections(&mut field.selection_set, hide_lists_and_objects);
            }
            ast::Selection::InlineFragment(inline) => {
                let inline = inline.make_mut();
                rewrite_directives(&mut inline.directives, hide_lists_and_objects);
                rewrite_selections(&mut inline.selection_set, hide_lists_and_objects);
            }
            ast::Selection::FragmentSpread(spread) => {
                rewrite_directives(&mut spread.make_mut().directives, hide_lists_and_objects);
            }
        }
    }
}

fn rewrite_directives(directives: &mut ast::DirectiveList, hide_lists_and_objects: bool) {
    for directive in directives.0.iter_mut() {
        for argument in directive.make_mut().arguments.iter_mut() {
            rewrite_value(&mut argument.make_mut().value, hide_lists_and_objects);
        }
    }
}

fn rewrite_value(value: &mut Node<ast::Value>, hide_lists_and_objects: bool) {
    match value.make_mut() {
        ast::Value::Int(int) => *int = 0.into(),
        ast::Value::Float(float) => *float = 0.0.into(),
        ast::Value::String(string) => string.clear(),
        ast::Value::List(values) => {
            if hide_lists_and_objects {
                values.clear();
            } else {
                for element in values.iter_mut() {
                    rewrite_value(element, hide_lists_and_objects);
                }
            }
        }
        ast::Value::Object(fields) => {
            if hide_lists_and_objects {
                fields.clear();
            } else {
                for (_, field_value) in fields.iter_mut() {
                    rewrite_value(field_value, hide_lists_and_objects);
                }
            }
        }
        ast::Value::Null | ast::Value::Enum(_) | ast::Value::Variable(_) | ast::Value::Boolean(_) => {}
    }
}

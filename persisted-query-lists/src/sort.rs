use apollo_compiler::ast;

/// Rebuild a document so that operation definitions precede fragment
/// definitions and each kind is ordered by name, ascending. Anonymous
/// operations sort before named ones. Non-executable definitions are
/// dropped.
///
/// Sorting top-level definitions matters because common clients can easily
/// find all operation and fragment definitions at build time but cannot
/// guarantee what order they will appear in at run time. Applying the same
/// ordering on both sides makes the printed form comparable.
///
/// The sort is idempotent: applying it to an already-sorted document
/// reproduces the same document.
pub fn sort_top_level_definitions(document: &ast::Document) -> ast::Document {
    let mut operations = vec![];
    let mut fragments = vec![];

    for definition in &document.definitions {
        match definition {
            ast::Definition::OperationDefinition(def) => operations.push(def.clone()),
            ast::Definition::FragmentDefinition(def) => fragments.push(def.clone()),
            _ => {}
        }
    }

    let mut sorted = ast::Document::new();

    operations.sort_by_key(|def| def.name.clone());
    sorted
        .definitions
        .extend(operations.into_iter().map(Into::into));

    fragments.sort_by_key(|def| def.name.clone());
    sorted
        .definitions
        .extend(fragments.into_iter().map(Into::into));

    sorted
}

/// The canonical printed form of a document: top-level definitions sorted by
/// [`sort_top_level_definitions`], then printed with the serializer's default
/// formatting, which normalizes all ignored characters (whitespace, commas,
/// comments). Two documents that differ only cosmetically canonicalize to the
/// same string.
pub fn canonical_print(document: &ast::Document) -> String {
    sort_top_level_definitions(document).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ast::Document {
        ast::Document::parse(source, "test.graphql").unwrap()
    }

    fn describe(definition: &ast::Definition) -> String {
        match definition {
            ast::Definition::OperationDefinition(def) => format!(
                "{} {}",
                crate::OperationType::from(def.operation_type),
                def.name
                    .as_ref()
                    .map(|name| name.as_str())
                    .unwrap_or("<anonymous>")
            ),
            ast::Definition::FragmentDefinition(def) => format!("fragment {}", def.name),
            _ => "other".to_string(),
        }
    }

    #[test]
    fn orders_operations_before_fragments_and_each_kind_by_name() {
        let document = parse(
            "fragment F on T {f} fragment D on T {f} query X {f} \
             mutation B {f} fragment A on T {f} subscription {f}",
        );

        let sorted = sort_top_level_definitions(&document);
        let order: Vec<String> = sorted.definitions.iter().map(describe).collect();

        assert_eq!(
            order,
            [
                "subscription <anonymous>",
                "mutation B",
                "query X",
                "fragment A",
                "fragment D",
                "fragment F",
            ]
        );
    }

    #[test]
    fn sorting_is_idempotent() {
        let document = parse("fragment B on T { b } query A { ...B } fragment C on T { c }");

        let once = canonical_print(&document);
        let twice = canonical_print(&ast::Document::parse(&once, "sorted.graphql").unwrap());

        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_print_is_whitespace_insensitive() {
        let compact = parse("query Q{a b ...F} fragment F on T{f}");
        let airy = parse("fragment F on T {\n  f\n}\n\nquery Q {\n  a\n  b\n  ...F\n}\n");

        assert_eq!(canonical_print(&compact), canonical_print(&airy));
    }

    #[test]
    fn field_order_within_a_selection_set_is_preserved() {
        let one = parse("query Q { a b }");
        let other = parse("query Q { b a }");

        assert_ne!(canonical_print(&one), canonical_print(&other));
    }
}

use hierdb::*;

/// A database with a small primitive cell library `cells`.
pub fn cells_db() -> NetlistDB {
    let mut db = NetlistDB::new();
    let cells = db.create_library("cells", LibraryKind::Primitives).unwrap();
    let gates: [(&str, &[&str]); 5] = [
        ("BUF", &["A"]),
        ("INV", &["A"]),
        ("AND2", &["A", "B"]),
        ("OR2", &["A", "B"]),
        ("LOGIC1", &[]),
    ];
    for (name, inputs) in gates {
        let ports = inputs.iter()
            .map(|p| PortDecl::scalar(*p, Direction::Input))
            .chain([PortDecl::scalar("Y", Direction::Output)]);
        db.create_primitive(cells, name, ports).unwrap();
    }
    db
}

/// Sorted names of terminal occurrences.
#[allow(dead_code)]
pub fn names<'a>(
    db: &NetlistDB, occs: impl IntoIterator<Item = &'a TermOccurrence>
) -> Vec<String> {
    let mut v = occs.into_iter()
        .map(|o| db.occurrence_name(o).unwrap())
        .collect::<Vec<_>>();
    v.sort();
    v
}

//! File discovery and scan summaries

use pretty_assertions::assert_eq;

use sql_scope::loader::{collect_sql_files, read_sql_file, scan_file, scan_files};
use sql_scope::SqlScopeError;

use crate::common::{path_string, TestWorkspace};

const SCRIPT: &str = "\u{FEFF}CREATE TABLE #stage (id INT, total MONEY)\n\
                      INSERT INTO #stage (id, total) SELECT id, total FROM sales.Orders\n\
                      GO\n\
                      WITH big AS (SELECT id FROM sales.Orders WHERE total > 100)\n\
                      SELECT b.id, u.name FROM big b JOIN dbo.Users u ON u.id = b.id\n";

#[test]
fn test_scan_summary_of_script() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("load.sql", SCRIPT);

    let summary = scan_file(&path, 16).unwrap().summary();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.temp_tables, vec!["#stage".to_string()]);

    let types: Vec<&str> = summary.statements.iter().map(|s| s.statement_type).collect();
    assert_eq!(types, vec!["CREATE", "INSERT", "SELECT"]);

    let select = &summary.statements[2];
    assert_eq!(select.batch, 1);
    assert_eq!(select.line, 4);
    assert_eq!(select.ctes, vec!["big".to_string()]);
    assert!(select.tables.contains(&"dbo.Users".to_string()));
}

#[test]
fn test_bom_stripped_before_parse() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("bom.sql", SCRIPT);
    let text = read_sql_file(&path).unwrap();
    assert!(text.starts_with("CREATE TABLE"));
}

#[test]
fn test_collect_mixes_files_dirs_and_globs() {
    let workspace = TestWorkspace::new();
    let single = workspace.write("one.sql", "SELECT 1");
    workspace.write("procs/a.sql", "EXEC a");
    workspace.write("procs/nested/b.sql", "EXEC b");
    workspace.write("views/v.sql", "SELECT 2");
    workspace.write("views/readme.md", "docs");

    let inputs = vec![
        path_string(&single),
        path_string(&workspace.path("procs")),
        format!("{}/views/*.sql", workspace.root_str()),
        // Duplicate on purpose
        path_string(&single),
    ];
    let files = collect_sql_files(&inputs, &[]).unwrap();
    assert_eq!(
        files,
        vec![
            single.clone(),
            workspace.path("procs/a.sql"),
            workspace.path("procs/nested/b.sql"),
            workspace.path("views/v.sql"),
        ]
    );

    let exclude = vec![format!("{}/procs/nested/*", workspace.root_str())];
    let files = collect_sql_files(&inputs, &exclude).unwrap();
    assert_eq!(files.len(), 3);
    assert!(!files.contains(&workspace.path("procs/nested/b.sql")));
}

#[test]
fn test_invalid_exclude_pattern() {
    let workspace = TestWorkspace::new();
    let err = collect_sql_files(&[workspace.root_str()], &["[".to_string()]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SqlScopeError>(),
        Some(SqlScopeError::InvalidPattern { .. })
    ));
}

#[test]
fn test_scan_files_reports_missing_file() {
    let workspace = TestWorkspace::new();
    let mut files: Vec<_> = (0..9)
        .map(|i| workspace.write(&format!("s{i}.sql"), format!("SELECT {i}")))
        .collect();
    files.push(workspace.path("gone.sql"));

    let err = scan_files(&files, 16).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SqlScopeError>(),
        Some(SqlScopeError::SqlFileReadError { .. })
    ));

    files.pop();
    let scanned = scan_files(&files, 16).unwrap();
    assert_eq!(scanned.len(), 9);
    assert!(scanned.iter().all(|f| f.output.chunks.len() == 1));
}

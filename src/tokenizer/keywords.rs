//! Reserved-word table with syntax categories

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

/// Syntax category of a reserved word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    Statement,
    Clause,
    Function,
    DataType,
    Operator,
    Constraint,
    Modifier,
    Misc,
}

impl KeywordCategory {
    /// Categories whose words may still name a table, column or alias
    /// (`SELECT [date], count FROM type`).
    pub fn is_soft(self) -> bool {
        matches!(
            self,
            KeywordCategory::Function | KeywordCategory::DataType | KeywordCategory::Misc
        )
    }
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "CREATE", "ALTER", "DROP", "TRUNCATE",
    "WITH", "EXEC", "EXECUTE", "DECLARE", "SET", "USE", "GO", "BEGIN", "END", "COMMIT",
    "ROLLBACK", "SAVE", "IF", "ELSE", "WHILE", "RETURN", "PRINT", "GRANT", "REVOKE", "DENY",
    "RAISERROR", "THROW", "BREAK", "CONTINUE", "GOTO", "WAITFOR", "OPEN", "CLOSE",
    "DEALLOCATE", "BULK", "CHECKPOINT", "DBCC", "KILL", "BACKUP", "RESTORE", "REVERT",
    "SETUSER", "SHUTDOWN", "READTEXT", "WRITETEXT", "UPDATETEXT", "RECONFIGURE",
];

const CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "INTO", "VALUES", "JOIN", "ON",
    "UNION", "INTERSECT", "EXCEPT", "TOP", "DISTINCT", "AS", "OUTPUT", "OPTION", "OFFSET",
    "FETCH", "ROWS", "ROW", "NEXT", "FIRST", "ONLY", "APPLY", "OVER", "PARTITION", "USING",
    "WHEN", "THEN", "MATCHED", "FOR", "LIMIT", "RETURNS", "PIVOT", "UNPIVOT", "WITHIN",
    "TABLESAMPLE", "BROWSE", "COMPUTE", "COLLATE", "ESCAPE", "CURSOR", "TRAN",
    "TRANSACTION", "TRY", "CATCH",
];

const OPERATOR_KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "BETWEEN", "EXISTS", "ALL", "ANY",
    "SOME", "CASE",
];

const MODIFIER_KEYWORDS: &[&str] = &[
    "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "ASC", "DESC", "PERCENT",
    "TIES", "DEFAULT", "NOCHECK", "READONLY", "OUT", "RECOMPILE", "ENCRYPTION", "SCHEMABINDING",
    "LOCAL", "GLOBAL", "STATIC", "DYNAMIC", "FORWARD_ONLY", "SCROLL", "OFF", "HOLDLOCK",
    "NOLOCK", "UPDLOCK", "ROWLOCK", "TABLOCK", "TABLOCKX", "PAGLOCK", "READPAST",
    "READUNCOMMITTED", "READCOMMITTED", "REPEATABLEREAD", "SERIALIZABLE", "XLOCK", "NOWAIT",
];

const CONSTRAINT_KEYWORDS: &[&str] = &[
    "PRIMARY", "KEY", "FOREIGN", "REFERENCES", "UNIQUE", "CHECK", "CONSTRAINT", "IDENTITY",
    "CLUSTERED", "NONCLUSTERED", "INDEX", "CASCADE", "ROWGUIDCOL", "PERSISTED",
];

const DATATYPE_KEYWORDS: &[&str] = &[
    "INT", "BIGINT", "SMALLINT", "TINYINT", "BIT", "DECIMAL", "NUMERIC", "MONEY",
    "SMALLMONEY", "FLOAT", "REAL", "DATE", "DATETIME", "DATETIME2", "DATETIMEOFFSET",
    "SMALLDATETIME", "TIME", "CHAR", "VARCHAR", "NCHAR", "NVARCHAR", "TEXT", "NTEXT",
    "BINARY", "VARBINARY", "IMAGE", "UNIQUEIDENTIFIER", "XML", "SQL_VARIANT", "ROWVERSION",
    "TIMESTAMP", "HIERARCHYID", "GEOGRAPHY", "GEOMETRY", "SYSNAME", "INTEGER", "MAX",
];

const FUNCTION_KEYWORDS: &[&str] = &[
    "COUNT", "COUNT_BIG", "SUM", "AVG", "MIN", "MAX", "COALESCE", "ISNULL", "NULLIF", "IIF",
    "CAST", "CONVERT", "TRY_CAST", "TRY_CONVERT", "PARSE", "GETDATE", "GETUTCDATE",
    "SYSDATETIME", "DATEADD", "DATEDIFF", "DATEPART", "DATENAME", "EOMONTH", "LEN",
    "DATALENGTH", "SUBSTRING", "LEFT", "RIGHT", "UPPER", "LOWER", "LTRIM", "RTRIM", "TRIM",
    "REPLACE", "CHARINDEX", "PATINDEX", "CONCAT", "CONCAT_WS", "STRING_AGG", "STRING_SPLIT",
    "STUFF", "FORMAT", "ROUND", "ABS", "CEILING", "FLOOR", "POWER", "SQRT", "ROW_NUMBER",
    "RANK", "DENSE_RANK", "NTILE", "LAG", "LEAD", "FIRST_VALUE", "LAST_VALUE", "NEWID",
    "OBJECT_ID", "OBJECT_NAME", "SCOPE_IDENTITY", "CHOOSE", "OPENJSON", "JSON_VALUE",
    "JSON_QUERY", "OPENQUERY", "OPENROWSET", "CONTAINS", "FREETEXT",
];

const MISC_KEYWORDS: &[&str] = &[
    "TABLE", "VIEW", "PROCEDURE", "PROC", "FUNCTION", "TRIGGER", "SCHEMA", "DATABASE",
    "SEQUENCE", "SYNONYM", "TYPE", "LOGIN", "USER", "ROLE", "NOCOUNT", "XACT_ABORT",
    "ANSI_NULLS", "QUOTED_IDENTIFIER", "IDENTITY_INSERT", "STATISTICS", "RECURSIVE",
    "XMLNAMESPACES",
];

static KEYWORDS: LazyLock<HashMap<&'static str, KeywordCategory>> = LazyLock::new(|| {
    let groups: [(&[&str], KeywordCategory); 8] = [
        // Later groups never override earlier ones: a word listed both as a
        // structural keyword and a function (LEFT, RIGHT) stays structural.
        (STATEMENT_KEYWORDS, KeywordCategory::Statement),
        (CLAUSE_KEYWORDS, KeywordCategory::Clause),
        (OPERATOR_KEYWORDS, KeywordCategory::Operator),
        (MODIFIER_KEYWORDS, KeywordCategory::Modifier),
        (CONSTRAINT_KEYWORDS, KeywordCategory::Constraint),
        (DATATYPE_KEYWORDS, KeywordCategory::DataType),
        (FUNCTION_KEYWORDS, KeywordCategory::Function),
        (MISC_KEYWORDS, KeywordCategory::Misc),
    ];
    let mut map = HashMap::with_capacity(512);
    for (words, category) in groups {
        for word in words {
            map.entry(*word).or_insert(category);
        }
    }
    map
});

/// Case-insensitive reserved-word lookup.
pub fn keyword_category(word: &str) -> Option<KeywordCategory> {
    if word.is_empty() || word.len() > 32 {
        return None;
    }
    KEYWORDS.get(word.to_ascii_uppercase().as_str()).copied()
}

#[inline]
pub fn is_keyword(word: &str) -> bool {
    keyword_category(word).is_some()
}

/// Keywords that begin a top-level statement.
pub const STATEMENT_STARTERS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "CREATE", "ALTER", "DROP", "TRUNCATE",
    "WITH", "EXEC", "EXECUTE", "DECLARE", "SET", "USE",
];

/// Control-flow words that end the current statement without starting one.
pub const CONTROL_KEYWORDS: &[&str] = &[
    "BEGIN", "END", "IF", "ELSE", "WHILE", "RETURN", "PRINT", "COMMIT", "ROLLBACK", "GO",
    "RAISERROR", "THROW", "BREAK", "CONTINUE", "GOTO", "WAITFOR", "OPEN", "CLOSE",
    "DEALLOCATE",
];

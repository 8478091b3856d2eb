use super::backend::{ColumnInfo, ForeignKeyInfo};
use crate::core::{Result, SchemaError, StorageType};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// DDL statements understood by the in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlStatement {
    CreateTable {
        table: String,
        columns: Vec<ColumnInfo>,
        foreign_keys: Vec<ForeignKeyInfo>,
        if_not_exists: bool,
    },
    AddColumn {
        table: String,
        column: ColumnInfo,
        foreign_key: Option<ForeignKeyInfo>,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyInfo,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        unique: bool,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
}

pub struct DdlParser {
    dialect: PostgreSqlDialect,
}

impl DdlParser {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    pub fn parse(&self, sql: &str) -> Result<Vec<DdlStatement>> {
        let external_stmts =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| SchemaError::Parse(e.to_string()))?;

        external_stmts
            .into_iter()
            .map(|stmt| self.convert_statement(stmt))
            .collect()
    }

    fn convert_statement(&self, stmt: sql_ast::Statement) -> Result<DdlStatement> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => self.convert_create_table(create),
            sql_ast::Statement::AlterTable { name, operations, .. } => {
                if operations.len() != 1 {
                    return Err(SchemaError::Parse(
                        "Only single ALTER TABLE operation supported".into(),
                    ));
                }
                let table = extract_table_name(&name)?;
                match operations.into_iter().next() {
                    Some(operation) => self.convert_alter_table(table, operation),
                    None => Err(SchemaError::Parse("ALTER TABLE without operation".into())),
                }
            }
            sql_ast::Statement::CreateIndex(ci) => self.convert_create_index(&ci),
            sql_ast::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => {
                if !matches!(object_type, sql_ast::ObjectType::Table) || names.len() != 1 {
                    return Err(SchemaError::Parse(format!(
                        "Only single DROP TABLE supported, got: {:?}",
                        object_type
                    )));
                }
                Ok(DdlStatement::DropTable {
                    table: extract_table_name(&names[0])?,
                    if_exists,
                })
            }
            _ => Err(SchemaError::Parse(format!(
                "Statement type not supported: {}",
                stmt
            ))),
        }
    }

    fn convert_create_table(&self, create: sql_ast::CreateTable) -> Result<DdlStatement> {
        let table = extract_table_name(&create.name)?;
        let mut columns = Vec::with_capacity(create.columns.len());
        let mut foreign_keys = Vec::new();

        for col in create.columns {
            let (column, foreign_key) = self.convert_column_def(col)?;
            columns.push(column);
            foreign_keys.extend(foreign_key);
        }

        for constraint in create.constraints {
            foreign_keys.extend(convert_foreign_key_constraint(constraint)?);
        }

        Ok(DdlStatement::CreateTable {
            table,
            columns,
            foreign_keys,
            if_not_exists: create.if_not_exists,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> Result<(ColumnInfo, Option<ForeignKeyInfo>)> {
        let storage = self.convert_data_type(&col.data_type)?;
        let mut column = ColumnInfo {
            name: col.name.value.clone(),
            storage,
            nullable: true,
            unique: false,
            primary_key: false,
        };
        let mut foreign_key = None;

        for option in col.options {
            match option.option {
                sql_ast::ColumnOption::NotNull => column.nullable = false,
                sql_ast::ColumnOption::Unique { is_primary, .. } => {
                    column.unique = true;
                    if is_primary {
                        column.primary_key = true;
                        column.nullable = false;
                    }
                }
                sql_ast::ColumnOption::ForeignKey {
                    foreign_table,
                    referred_columns,
                    ..
                } => {
                    foreign_key = Some(ForeignKeyInfo {
                        name: option.name.map(|ident| ident.value),
                        column: column.name.clone(),
                        target_table: extract_table_name(&foreign_table)?,
                        target_column: referred_columns
                            .first()
                            .map(|ident| ident.value.clone())
                            .unwrap_or_else(|| "id".to_string()),
                    });
                }
                _ => {}
            }
        }

        Ok((column, foreign_key))
    }

    fn convert_data_type(&self, dt: &sql_ast::DataType) -> Result<StorageType> {
        match dt {
            sql_ast::DataType::Int(_) | sql_ast::DataType::Integer(_) => Ok(StorageType::Integer),
            sql_ast::DataType::BigInt(_) => Ok(StorageType::BigInt),
            sql_ast::DataType::SmallInt(_) => Ok(StorageType::SmallInt),

            sql_ast::DataType::Float(_)
            | sql_ast::DataType::Double(_)
            | sql_ast::DataType::DoublePrecision
            | sql_ast::DataType::Real => Ok(StorageType::Double),

            sql_ast::DataType::Numeric(info) | sql_ast::DataType::Decimal(info) => match info {
                sql_ast::ExactNumberInfo::PrecisionAndScale(precision, scale) => Ok(StorageType::Numeric {
                    precision: *precision as u8,
                    scale: *scale as u8,
                }),
                sql_ast::ExactNumberInfo::Precision(precision) => Ok(StorageType::Numeric {
                    precision: *precision as u8,
                    scale: 0,
                }),
                sql_ast::ExactNumberInfo::None => Ok(StorageType::Numeric {
                    precision: 38,
                    scale: 0,
                }),
            },

            sql_ast::DataType::Varchar(Some(sql_ast::CharacterLength::IntegerLength { length, .. }))
            | sql_ast::DataType::CharacterVarying(Some(sql_ast::CharacterLength::IntegerLength {
                length,
                ..
            })) => Ok(StorageType::Varchar(*length as u32)),

            sql_ast::DataType::Text
            | sql_ast::DataType::Varchar(_)
            | sql_ast::DataType::CharacterVarying(_)
            | sql_ast::DataType::String(_) => Ok(StorageType::Text),

            sql_ast::DataType::Boolean | sql_ast::DataType::Bool => Ok(StorageType::Boolean),
            sql_ast::DataType::Date => Ok(StorageType::Date),
            sql_ast::DataType::Timestamp(..) => Ok(StorageType::Timestamp),
            sql_ast::DataType::Time(..) => Ok(StorageType::Time),
            sql_ast::DataType::Uuid => Ok(StorageType::Uuid),
            sql_ast::DataType::Bytea => Ok(StorageType::Bytea),

            _ => Err(SchemaError::Parse(format!("Unsupported data type: {}", dt))),
        }
    }

    fn convert_alter_table(&self, table: String, operation: sql_ast::AlterTableOperation) -> Result<DdlStatement> {
        match operation {
            sql_ast::AlterTableOperation::AddColumn { column_def, .. } => {
                let (column, foreign_key) = self.convert_column_def(column_def)?;
                Ok(DdlStatement::AddColumn {
                    table,
                    column,
                    foreign_key,
                })
            }
            sql_ast::AlterTableOperation::DropColumn { column_names, .. } => {
                if column_names.len() != 1 {
                    return Err(SchemaError::Parse("Only single column drop supported".into()));
                }
                Ok(DdlStatement::DropColumn {
                    table,
                    column: column_names[0].value.clone(),
                })
            }
            sql_ast::AlterTableOperation::AddConstraint { constraint, .. } => {
                match convert_foreign_key_constraint(constraint)? {
                    Some(foreign_key) => Ok(DdlStatement::AddForeignKey { table, foreign_key }),
                    None => Err(SchemaError::Parse(
                        "Only FOREIGN KEY constraints can be added".into(),
                    )),
                }
            }
            other => Err(SchemaError::Parse(format!(
                "Unsupported ALTER TABLE operation: {}",
                other
            ))),
        }
    }

    fn convert_create_index(&self, ci: &sql_ast::CreateIndex) -> Result<DdlStatement> {
        let name = match &ci.name {
            Some(n) => extract_table_name(n)?,
            None => {
                return Err(SchemaError::Parse("Index name is required".into()));
            }
        };

        let columns = ci
            .columns
            .iter()
            .map(|column| match &column.column.expr {
                sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
                _ => Err(SchemaError::Parse("Index column must be an identifier".into())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DdlStatement::CreateIndex {
            name,
            table: extract_table_name(&ci.table_name)?,
            columns,
            unique: ci.unique,
            if_not_exists: ci.if_not_exists,
        })
    }
}

impl Default for DdlParser {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_foreign_key_constraint(constraint: sql_ast::TableConstraint) -> Result<Option<ForeignKeyInfo>> {
    let sql_ast::TableConstraint::ForeignKey {
        name,
        columns,
        foreign_table,
        referred_columns,
        ..
    } = constraint
    else {
        return Ok(None);
    };

    if columns.len() != 1 {
        return Err(SchemaError::Parse(
            "Multi-column foreign keys are not supported".into(),
        ));
    }

    Ok(Some(ForeignKeyInfo {
        name: name.map(|ident| ident.value),
        column: columns[0].value.clone(),
        target_table: extract_table_name(&foreign_table)?,
        target_column: referred_columns
            .first()
            .map(|ident| ident.value.clone())
            .unwrap_or_else(|| "id".to_string()),
    }))
}

/// Unquoted value of the last name part; `"2024_task"` yields `2024_task`.
fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .ok_or_else(|| SchemaError::Parse(format!("Invalid object name: {}", name)))
}

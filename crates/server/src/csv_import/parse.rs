//! CSV reading and row validation for bulk imports.

use shared_types::{AppError, EntityRequest, EntityType, RowError, UserRole};
use validator::ValidateEmail;

/// `;` when the header line has more semicolons than commas, else `,`.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Lowercase and strip the diacritics used in Portuguese and Spanish text.
pub fn fold_ascii(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            'ý' | 'ÿ' => 'y',
            other => other,
        })
        .collect()
}

/// Header key: folded, trimmed, with spaces and dashes turned into `_`.
pub fn normalize_header(header: &str) -> String {
    fold_ascii(header.trim())
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// One data row. `line` is 1-based and counts the header.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub line: usize,
    fields: Vec<String>,
}

impl CsvRow {
    /// Trimmed, non-empty value of column `index`.
    pub fn get(&self, index: Option<usize>) -> Option<&str> {
        index
            .and_then(|i| self.fields.get(i))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    /// Records the reader could not decode.
    pub malformed: Vec<RowError>,
}

impl CsvTable {
    /// Index of the first header matching one of `aliases`.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.iter().any(|a| h == a))
    }
}

/// Parse raw CSV text. Blank lines are skipped; a leading BOM is ignored.
pub fn read_table(text: &str) -> Result<CsvTable, AppError> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(AppError::bad_request("CSV file is empty"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::bad_request(format!("Invalid CSV header: {}", e)))?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    let mut malformed = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 2);
                let row = CsvRow {
                    line,
                    fields: record.iter().map(str::to_string).collect(),
                };
                if !row.is_blank() {
                    rows.push(row);
                }
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 2);
                malformed.push(RowError {
                    line,
                    message: format!("Malformed row: {}", e),
                });
            }
        }
    }

    Ok(CsvTable {
        headers,
        rows,
        malformed,
    })
}

const NAME: &[&str] = &["name", "nome", "nome_completo", "full_name"];
const ENTITY_NAME: &[&str] = &["name", "nome", "entidade", "nome_da_entidade", "entity"];
const ENTITY_TYPE: &[&str] = &["type", "tipo", "entity_type", "tipo_de_entidade"];
const ACRONYM: &[&str] = &["acronym", "sigla"];
const EMAIL: &[&str] = &["email", "e_mail", "correio_eletronico"];
const PHONE: &[&str] = &["phone", "telefone", "fone"];
const WHATSAPP: &[&str] = &["whatsapp", "celular", "zap"];
const RESPONSIBLE: &[&str] = &["responsible", "responsavel", "responsible_name", "nome_do_responsavel"];
const ROLE: &[&str] = &["role", "papel", "perfil", "funcao"];

/// A validated entity row.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub line: usize,
    pub name: String,
    pub entity_type: EntityType,
    pub acronym: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub responsible: Option<String>,
}

impl EntityRow {
    pub fn to_request(&self) -> EntityRequest {
        EntityRequest {
            name: self.name.clone(),
            acronym: self.acronym.clone(),
            entity_type: self.entity_type,
            email: self.email.clone(),
            phone: self.phone.clone(),
            whatsapp: self.whatsapp.clone(),
            telegram_chat_id: None,
            address: None,
            responsible_name: self.responsible.clone(),
            active: true,
        }
    }
}

/// A validated user row.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub line: usize,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub role: UserRole,
}

fn valid_email(row: &CsvRow, column: Option<usize>) -> Result<Option<String>, String> {
    match row.get(column) {
        Some(email) if email.validate_email() => Ok(Some(email.to_lowercase())),
        Some(email) => Err(format!("Invalid email '{}'", email)),
        None => Ok(None),
    }
}

fn missing_column(name: &str) -> AppError {
    AppError::bad_request(format!("CSV is missing the required column '{}'", name))
}

/// Validate the rows of an entity sheet. Invalid rows become errors.
pub fn entity_rows(table: &CsvTable) -> Result<(Vec<EntityRow>, Vec<RowError>), AppError> {
    let name_col = table.column(ENTITY_NAME).ok_or_else(|| missing_column("name"))?;
    let type_col = table.column(ENTITY_TYPE);
    let acronym_col = table.column(ACRONYM);
    let email_col = table.column(EMAIL);
    let phone_col = table.column(PHONE);
    let whatsapp_col = table.column(WHATSAPP);
    let responsible_col = table.column(RESPONSIBLE);

    let mut valid = Vec::new();
    let mut errors = table.malformed.clone();

    for row in &table.rows {
        let result = (|| {
            let name = row.get(Some(name_col)).ok_or("Name is required")?.to_string();
            let entity_type = match row.get(type_col) {
                Some(raw) => EntityType::parse(&fold_ascii(raw))
                    .ok_or_else(|| format!("Unknown entity type '{}'", raw))?,
                None => EntityType::default(),
            };
            Ok::<_, String>(EntityRow {
                line: row.line,
                name,
                entity_type,
                acronym: row.get(acronym_col).map(str::to_string),
                email: valid_email(row, email_col)?,
                phone: row.get(phone_col).map(str::to_string),
                whatsapp: row.get(whatsapp_col).map(str::to_string),
                responsible: row.get(responsible_col).map(str::to_string),
            })
        })();

        match result {
            Ok(parsed) => valid.push(parsed),
            Err(message) => errors.push(RowError {
                line: row.line,
                message,
            }),
        }
    }

    errors.sort_by_key(|e| e.line);
    Ok((valid, errors))
}

/// Role column of a user sheet. Blank means member.
pub fn parse_import_role(raw: Option<&str>) -> Option<UserRole> {
    match raw.map(fold_ascii).as_deref().map(str::trim) {
        None | Some("") => Some(UserRole::EntityMember),
        Some("member" | "membro" | "entity_member") => Some(UserRole::EntityMember),
        Some("head" | "chefe" | "responsavel" | "entity_head") => Some(UserRole::EntityHead),
        _ => None,
    }
}

/// Validate the rows of a user sheet. Invalid rows become errors.
pub fn user_rows(table: &CsvTable) -> Result<(Vec<UserRow>, Vec<RowError>), AppError> {
    let name_col = table.column(NAME).ok_or_else(|| missing_column("name"))?;
    let email_col = table.column(EMAIL);
    let phone_col = table.column(PHONE);
    let whatsapp_col = table.column(WHATSAPP);
    let role_col = table.column(ROLE);

    let mut valid = Vec::new();
    let mut errors = table.malformed.clone();

    for row in &table.rows {
        let result = (|| {
            let name = row.get(Some(name_col)).ok_or("Name is required")?.to_string();
            let role = parse_import_role(row.get(role_col)).ok_or_else(|| {
                format!(
                    "Unknown role '{}' (expected member or head)",
                    row.get(role_col).unwrap_or_default()
                )
            })?;
            Ok::<_, String>(UserRow {
                line: row.line,
                name,
                email: valid_email(row, email_col)?,
                phone: row.get(phone_col).map(str::to_string),
                whatsapp: row.get(whatsapp_col).map(str::to_string),
                role,
            })
        })();

        match result {
            Ok(parsed) => valid.push(parsed),
            Err(message) => errors.push(RowError {
                line: row.line,
                message,
            }),
        }
    }

    errors.sort_by_key(|e| e.line);
    Ok((valid, errors))
}

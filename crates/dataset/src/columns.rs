//! Canonical column names.
//!
//! Uploaded headers come in every shape (`Município`, ` CNES `, `Nome Fantaia`).
//! Everything is folded to a lowercase snake_case label, known typos are
//! rewritten, and only the pertinent columns below are ever persisted.

use std::fmt;
use std::str::FromStr;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::table::Table;

/// Technical identifier column, present on every stored row.
pub const ROW_ID_COLUMN: &str = "__id";

/// Known header typos/variants and their canonical label.
const ALIASES: &[(&str, &str)] = &[
    ("nome_fantaia", "nome_fantasia"),
    ("tipo equipe", "tipo_equipe"),
];

macro_rules! pertinent_columns {
    ($($variant:ident => $label:literal),+ $(,)?) => {
        /// The pertinent columns, in display order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Column {
            $($variant),+
        }

        impl Column {
            pub const ALL: &'static [Column] = &[$(Column::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Column::$variant => $label),+
                }
            }
        }

        impl FromStr for Column {
            type Err = UnknownColumn;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Column::$variant),)+
                    other => Err(UnknownColumn(other.to_string())),
                }
            }
        }
    };
}

pertinent_columns! {
    Municipio => "municipio",
    Cnes => "cnes",
    NomeFantasia => "nome_fantasia",
    ProfissionalNome => "profissional_nome",
    ProfissionalCns => "profissional_cns",
    ProfissionalAtendeSus => "profissional_atende_sus",
    ProfissionalCbo => "profissional_cbo",
    CargaHorariaAmbulatorialSus => "carga_horaria_ambulatorial_sus",
    CargaHorariaOutros => "carga_horaria_outros",
    ProfissionalVinculo => "profissional_vinculo",
    EquipeIne => "equipe_ine",
    TipoEquipe => "tipo_equipe",
    EquipeSubtipo => "equipe_subtipo",
    EquipeNome => "equipe_nome",
    EquipeArea => "equipe_area",
    EquipeDtAtivacao => "equipe_dt_ativacao",
    EquipeDtDesativacao => "equipe_dt_desativacao",
    EquipeDtEntrada => "equipe_dt_entrada",
    EquipeDtDesligamento => "equipe_dt_desligamento",
    NaturezaJuridica => "natureza_juridica",
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColumn(pub String);

impl fmt::Display for UnknownColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown column '{}'", self.0)
    }
}

impl std::error::Error for UnknownColumn {}

/// Normalize a single header label.
///
/// trim → lowercase → strip diacritics → spaces to underscores → alias table.
pub fn normalize_label(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect();
    let label = folded.replace(' ', "_");

    ALIASES
        .iter()
        .find(|(typo, _)| *typo == folded || *typo == label)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(label)
}

/// Relabel every column of `table` in place. Headers that collapse onto the
/// same label are merged.
pub fn normalize_columns(table: &mut Table) {
    table.rename_columns(normalize_label);
    table.merge_duplicate_columns();
}

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use usvg::fontdb;

/// Where the raster backend gets its glyphs from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FontSource {
    /// Query the system font database using the style's font family list.
    #[default]
    System,
    /// Load a single font file; used for both regular and bold text.
    File(PathBuf),
    /// No glyph data; widths come from the average-glyph approximation and text is not painted.
    Approximate,
}

/// How the glyph source for a raster export was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStatus {
    /// The requested font file or family list resolved.
    Requested,
    /// The request failed and the system sans-serif was used instead.
    Fallback,
    /// No glyphs at all; text is measured approximately and not painted.
    Unavailable,
}

impl FontStatus {
    pub fn paints_text(&self) -> bool {
        !matches!(self, FontStatus::Unavailable)
    }
}

/// The system font database, scanned at most once and shared by every lookup
/// of a load.
#[derive(Default)]
pub struct SystemFonts {
    db: Option<fontdb::Database>,
}

impl SystemFonts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_database(db: fontdb::Database) -> Self {
        Self { db: Some(db) }
    }

    fn database(&mut self) -> &fontdb::Database {
        self.db.get_or_insert_with(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!("scanned {} system font faces", db.len());
            db
        })
    }
}

#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    advances: Arc<HashMap<char, u16>>,
    family: Option<String>,
}

impl FontFace {
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("failed to parse font data ({})", err))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let family = extract_family_name(&face);
        let advances = collect_advances(&face);
        Ok(Self {
            data: Arc::new(data),
            face_index,
            units_per_em,
            space_advance,
            advances: Arc::new(advances),
            family,
        })
    }

    /// Horizontal advance of `ch` in font units, read once when the face was loaded.
    pub fn advance(&self, ch: char) -> Option<u16> {
        self.advances.get(&ch).copied()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn space_advance(&self) -> u16 {
        self.space_advance
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }
}

#[derive(Clone, Default)]
pub struct FontSet {
    regular: Option<FontFace>,
    bold: Option<FontFace>,
}

impl FontSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_faces(regular: FontFace, bold: Option<FontFace>) -> Self {
        Self {
            regular: Some(regular),
            bold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none()
    }

    /// The bold face only, without falling back to regular.
    pub fn bold_face(&self) -> Option<&FontFace> {
        self.bold.as_ref()
    }

    /// Bold text falls back to the regular face when no bold face was found.
    pub fn face(&self, bold: bool) -> Option<&FontFace> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }
    }

    /// Loads fonts for `source`. Errors are the caller's to recover from.
    pub fn load(source: &FontSource, font_family: &str) -> Result<Self> {
        Self::load_with(source, font_family, &mut SystemFonts::new())
    }

    pub fn load_with(
        source: &FontSource,
        font_family: &str,
        system: &mut SystemFonts,
    ) -> Result<Self> {
        match source {
            FontSource::Approximate => Ok(Self::empty()),
            FontSource::File(path) => {
                let face = load_font_file(path)?;
                Ok(Self::from_faces(face, None))
            }
            FontSource::System => load_from_family_list(system.database(), font_family),
        }
    }

    /// Best-effort load: failures are logged and replaced by the system sans-serif,
    /// or by approximate metrics when no font is available at all.
    pub fn load_or_fallback(source: &FontSource, font_family: &str) -> (Self, FontStatus) {
        Self::load_or_fallback_with(source, font_family, &mut SystemFonts::new())
    }

    pub fn load_or_fallback_with(
        source: &FontSource,
        font_family: &str,
        system: &mut SystemFonts,
    ) -> (Self, FontStatus) {
        if matches!(source, FontSource::Approximate) {
            return (Self::empty(), FontStatus::Unavailable);
        }
        let err = match Self::load_with(source, font_family, system) {
            Ok(fonts) => return (fonts, FontStatus::Requested),
            Err(err) => err,
        };
        warn!("font load failed, using default font: {:#}", err);
        match load_family(system.database(), "sans-serif") {
            Ok(fonts) => (fonts, FontStatus::Fallback),
            Err(err) => {
                warn!("no default font available, text will not be painted: {:#}", err);
                (Self::empty(), FontStatus::Unavailable)
            }
        }
    }
}

pub fn load_font_file(path: &Path) -> Result<FontFace> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontFace::from_data(data, 0)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn load_from_family_list(db: &fontdb::Database, font_family: &str) -> Result<FontSet> {
    let candidates: Vec<&str> = font_family
        .split(',')
        .map(|name| name.trim().trim_matches(|ch| ch == '"' || ch == '\''))
        .filter(|name| !name.is_empty())
        .collect();
    for candidate in &candidates {
        match load_family(db, candidate) {
            Ok(fonts) => {
                debug!("resolved font family {}", candidate);
                return Ok(fonts);
            }
            Err(err) => debug!("font family {} unavailable: {}", candidate, err),
        }
    }
    Err(anyhow!("no font found for family list '{}'", font_family))
}

fn load_family(db: &fontdb::Database, family: &str) -> Result<FontSet> {
    let generic = matches!(
        family.to_ascii_lowercase().as_str(),
        "sans-serif" | "system-ui" | "ui-sans-serif"
    );
    let families = if generic {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let regular = query_face(db, &families, fontdb::Weight::NORMAL)
        .ok_or_else(|| anyhow!("font not found: {}", family))??;
    let bold = match query_face(db, &families, fontdb::Weight::BOLD) {
        Some(Ok(face)) => Some(face),
        _ => None,
    };
    Ok(FontSet::from_faces(regular, bold))
}

fn query_face(
    db: &fontdb::Database,
    families: &[fontdb::Family<'_>],
    weight: fontdb::Weight,
) -> Option<Result<FontFace>> {
    let query = fontdb::Query {
        families,
        weight,
        ..Default::default()
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| FontFace::from_data(data.to_vec(), index))
}

fn collect_advances(face: &Face<'_>) -> HashMap<char, u16> {
    let mut advances = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return advances;
    };
    for subtable in cmap.subtables {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|code| {
            if let Some(ch) = char::from_u32(code)
                && let Some(glyph) = subtable.glyph_index(code)
                && let Some(advance) = face.glyph_hor_advance(glyph)
            {
                advances.entry(ch).or_insert(advance);
            }
        });
    }
    advances
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == ttf_parser::name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

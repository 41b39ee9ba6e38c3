use std::path::{Path, PathBuf};

use anyhow::Context;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

/// One dump declared for a game.
#[derive(Debug, Clone, Serialize)]
pub struct DatRom {
    pub name: String,
    pub size: Option<u64>,
    /// Lowercased 40-hex digest when the catalog declares one.
    pub sha1: Option<String>,
}

/// A release record ties a game to a region code (e.g. `USA`).
#[derive(Debug, Clone, Serialize)]
pub struct DatRelease {
    pub region: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatGame {
    pub name: String,
    pub clone_of: Option<String>,
    pub releases: Vec<DatRelease>,
    pub roms: Vec<DatRom>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatHeader {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Detector file referenced by a `<clrmamepro header="..."/>` element.
    pub detector: Option<String>,
}

/// The typed catalog tree. Games keep document order; candidate input
/// indexes are positions in `games`.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub path: PathBuf,
    pub header: DatHeader,
    pub games: Vec<DatGame>,
}

impl Catalog {
    /// False for "Standard DATs" that carry no parent/clone relations at
    /// all; selection degrades to one group per game there.
    pub fn has_clone_relations(&self) -> bool {
        self.games.iter().any(|game| game.clone_of.is_some())
    }
}

pub fn parse_dat(path: &Path) -> anyhow::Result<Catalog> {
    let mut reader = Reader::from_file(path)
        .with_context(|| format!("unable to open DAT file: {}", path.display()))?;
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut header = DatHeader::default();
    let mut games: Vec<DatGame> = Vec::new();
    let mut current_game: Option<DatGame> = None;
    let mut in_header = false;
    let mut header_text: Option<HeaderField> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .with_context(|| format!("malformed XML in DAT file: {}", path.display()))?
        {
            Event::Start(ref e) => match e.name().as_ref() {
                b"header" => in_header = true,
                b"name" if in_header => header_text = Some(HeaderField::Name),
                b"description" if in_header => header_text = Some(HeaderField::Description),
                b"game" | b"machine" => current_game = Some(game_from_attributes(e)),
                b"release" => {
                    if let (Some(game), Some(release)) =
                        (current_game.as_mut(), release_from_attributes(e))
                    {
                        game.releases.push(release);
                    }
                }
                b"rom" => {
                    if let Some(game) = current_game.as_mut() {
                        game.roms.push(rom_from_attributes(e));
                    }
                }
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"clrmamepro" if in_header => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"header" {
                            header.detector =
                                Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                    }
                }
                b"release" => {
                    if let (Some(game), Some(release)) =
                        (current_game.as_mut(), release_from_attributes(e))
                    {
                        game.releases.push(release);
                    }
                }
                b"rom" => {
                    if let Some(game) = current_game.as_mut() {
                        game.roms.push(rom_from_attributes(e));
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(field) = header_text.take() {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match field {
                        HeaderField::Name => header.name = Some(text),
                        HeaderField::Description => header.description = Some(text),
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"header" => in_header = false,
                b"name" | b"description" => header_text = None,
                b"game" | b"machine" => {
                    if let Some(game) = current_game.take() {
                        games.push(game);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Catalog {
        path: path.to_path_buf(),
        header,
        games,
    })
}

enum HeaderField {
    Name,
    Description,
}

fn game_from_attributes(e: &quick_xml::events::BytesStart<'_>) -> DatGame {
    let mut game = DatGame {
        name: String::new(),
        clone_of: None,
        releases: Vec::new(),
        roms: Vec::new(),
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"name" => game.name = value,
            b"cloneof" => {
                if !value.is_empty() {
                    game.clone_of = Some(value);
                }
            }
            _ => {}
        }
    }
    game
}

fn release_from_attributes(e: &quick_xml::events::BytesStart<'_>) -> Option<DatRelease> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"region" {
            let region = String::from_utf8_lossy(&attr.value).trim().to_uppercase();
            if !region.is_empty() {
                return Some(DatRelease { region });
            }
        }
    }
    None
}

fn rom_from_attributes(e: &quick_xml::events::BytesStart<'_>) -> DatRom {
    let mut rom = DatRom {
        name: String::new(),
        size: None,
        sha1: None,
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"name" => rom.name = value,
            b"size" => rom.size = value.parse().ok(),
            b"sha1" => {
                let digest = value.to_ascii_lowercase();
                if !digest.is_empty() {
                    rom.sha1 = Some(digest);
                }
            }
            _ => {}
        }
    }
    rom
}

use std::fmt;

use crate::stats::Counter;

/// Where an image file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// The wiki the subject's article is on.
    Local,
    /// The shared media repository.
    Shared,
}

impl Site {
    pub fn as_str(self) -> &'static str {
        match self {
            Site::Local => "local",
            Site::Shared => "shared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub page_id: i64,
    pub title: String,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// File title without the `File:` namespace.
    pub title: String,
    pub site: Site,
    pub url: String,
}

impl ImageReference {
    /// The title with characters that are unsafe in file names replaced by `_`.
    pub fn file_name(&self) -> String {
        self.title
            .chars()
            .map(|c| match c {
                ':' | '*' | '?' | '/' | '\\' => '_',
                c => c,
            })
            .collect()
    }
}

/// Everything harvested about one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub subject: Subject,
    pub sex: String,
    pub birth_date: String,
    pub death_date: Option<String>,
    pub image: ImageReference,
    pub image_description: Option<String>,
    pub image_year: String,
}

pub const RECORD_HEADER: [&str; 7] = [
    "Name",
    "Sex",
    "Birthdate",
    "Deathdate",
    "ImageName",
    "ImageDescription",
    "ImageDate",
];

impl Record {
    /// Tabular form, column order as in [`RECORD_HEADER`].
    pub fn to_row(&self) -> [String; 7] {
        [
            escape_newlines(&self.subject.title),
            escape_newlines(&self.sex),
            escape_newlines(&self.birth_date),
            escape_newlines(self.death_date.as_deref().unwrap_or("NoDeathDate")),
            escape_newlines(&self.image.file_name()),
            escape_newlines(self.image_description.as_deref().unwrap_or("NoDesc")),
            escape_newlines(&self.image_year),
        ]
    }
}

/// Replace each newline with the two characters `\n`.
pub fn escape_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

/// Why a subject produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoSuchPage,
    NoImage,
    NoDatableImage,
    NoClaims,
    NoBirthDate,
    NoSex,
}

impl Rejection {
    pub fn counter(self) -> Counter {
        match self {
            Rejection::NoSuchPage => Counter::NoSuchPage,
            Rejection::NoImage => Counter::NoImage,
            Rejection::NoDatableImage => Counter::NoDatableImage,
            Rejection::NoClaims => Counter::NoClaims,
            Rejection::NoBirthDate => Counter::NoBirthDate,
            Rejection::NoSex => Counter::NoSex,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::NoSuchPage => "page does not exist",
            Rejection::NoImage => "no representative image",
            Rejection::NoDatableImage => "image has no usable date",
            Rejection::NoClaims => "knowledge-base item has no claims",
            Rejection::NoBirthDate => "no birth date",
            Rejection::NoSex => "no sex",
        };
        f.write_str(s)
    }
}

/// Outcome for one subject: a full record or the first reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Accepted(Record),
    Rejected(Rejection),
}

//! Compiler/linker flag sets and library references.
//!
//! A [`FlagSet`] is parsed once per build from the output of the native
//! library's configuration tool and shared, read-only, by every compiled unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A native library to link, without the `-l` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryReference(String);

impl LibraryReference {
    /// Create a library reference from a bare library name.
    pub fn new(name: impl Into<String>) -> Self {
        LibraryReference(name.into())
    }

    /// The bare library name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The linker argument for this library (e.g. `-lSDL2`).
    pub fn link_arg(&self) -> String {
        format!("-l{}", self.0)
    }
}

impl fmt::Display for LibraryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LibraryReference {
    fn from(name: &str) -> Self {
        LibraryReference::new(name)
    }
}

impl From<String> for LibraryReference {
    fn from(name: String) -> Self {
        LibraryReference(name)
    }
}

/// Ordered compiler and linker flags shared by all compiled units of a build.
///
/// The fields are private: once parsed a flag set is only ever read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    compile: Vec<String>,
    link: Vec<String>,
}

impl FlagSet {
    /// Create a flag set from already-tokenized flags.
    pub fn new(compile: Vec<String>, link: Vec<String>) -> Self {
        FlagSet { compile, link }
    }

    /// Parse the output of a `--cflags` and a `--libs` query.
    ///
    /// Compiler flags are kept verbatim. From the linker output, `-lNAME`
    /// tokens are pulled out as base libraries (in order); every other token
    /// stays a linker flag.
    pub fn from_query_output(cflags: &str, libs: &str) -> (FlagSet, Vec<LibraryReference>) {
        let compile = split_flags(cflags);
        let (link, libraries) = split_linker_flags(split_flags(libs));
        (FlagSet { compile, link }, libraries)
    }

    /// Compiler flags, in order.
    pub fn compile(&self) -> &[String] {
        &self.compile
    }

    /// Linker flags (excluding `-l` libraries), in order.
    pub fn link(&self) -> &[String] {
        &self.link
    }

    /// Check if the flag set carries no flags at all.
    pub fn is_empty(&self) -> bool {
        self.compile.is_empty() && self.link.is_empty()
    }
}

/// Separate `-lNAME` library tokens from other linker flags.
///
/// A bare `-l` takes the following token as the library name.
pub fn split_linker_flags(tokens: Vec<String>) -> (Vec<String>, Vec<LibraryReference>) {
    let mut flags = Vec::new();
    let mut libs = Vec::new();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        if token == "-l" {
            match tokens.next() {
                Some(name) => libs.push(LibraryReference::new(name)),
                None => flags.push(token),
            }
        } else if let Some(name) = token.strip_prefix("-l") {
            libs.push(LibraryReference::new(name));
        } else {
            flags.push(token);
        }
    }

    (flags, libs)
}

/// Split flag-tool output into tokens.
///
/// Splits on whitespace while honouring simple shell quoting: single quotes
/// are literal, double quotes allow `\"`, `\\`, `\$` and `` \` `` escapes, and
/// a backslash outside quotes escapes the next character. An unterminated
/// quote runs to the end of the input.
pub fn split_flags(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_token = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some(e @ ('"' | '\\' | '$' | '`')) => current.push(e),
                            Some('\n') => {}
                            Some(e) => {
                                current.push('\\');
                                current.push(e);
                            }
                            None => current.push('\\'),
                        },
                        _ => current.push(q),
                    }
                }
            }
            '\\' => match chars.next() {
                // line continuation
                Some('\n') => {}
                Some(e) => {
                    in_token = true;
                    current.push(e);
                }
                None => {
                    in_token = true;
                    current.push('\\');
                }
            },
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    tokens
}

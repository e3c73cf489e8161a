/* src/server/engine/rust/src/library.rs */

//! Shared front-end libraries requested by widget packages. Every pair of
//! libraries a package lists in order is one vote for that load order; the
//! votes decide where each deduplicated library lands in the page.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibKind {
  /// Shipped inside a widget package and addressed by path.
  Local,
  #[default]
  #[serde(other)]
  Generic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRequest {
  pub lib: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, rename = "type")]
  pub kind: LibKind,
  /// Class folder of the requesting widget, filled in when recorded.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub widget_path: String,
}

impl LibraryRequest {
  /// Identity used for votes and dedup under the generic schema.
  fn generic_key(&self) -> &str {
    match (self.kind, self.path.as_deref()) {
      (LibKind::Local, Some(path)) => path,
      _ => &self.lib,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibMode {
  Css,
  Js,
}

impl LibMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Css => "css",
      Self::Js => "js",
    }
  }
}

impl FromStr for LibMode {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "css" => Ok(Self::Css),
      "js" => Ok(Self::Js),
      other => Err(EngineError::UnknownLibraryMode(other.to_string())),
    }
  }
}

impl fmt::Display for LibMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How library identities are derived when voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
  /// Plain library names.
  Standard,
  /// Library names, or paths for local libraries.
  Generic,
}

/// Pairwise "load before" votes, per schema and mode.
#[derive(Debug, Default, Clone)]
pub struct DependencyTally {
  votes: HashMap<(SchemaType, LibMode), HashMap<String, HashMap<String, u32>>>,
}

impl DependencyTally {
  /// One vote for every `(i, j)` with `i < j` in `libs`.
  pub fn record(&mut self, libs: &[LibraryRequest], mode: LibMode, schema: SchemaType) {
    let table = self.votes.entry((schema, mode)).or_default();
    for (i, main) in libs.iter().enumerate() {
      for sub in &libs[i + 1..] {
        let (main, sub) = match schema {
          SchemaType::Standard => (main.lib.as_str(), sub.lib.as_str()),
          SchemaType::Generic => (main.generic_key(), sub.generic_key()),
        };
        *table.entry(main.to_string()).or_default().entry(sub.to_string()).or_default() += 1;
      }
    }
  }

  pub fn count(&self, schema: SchemaType, mode: LibMode, main: &str, sub: &str) -> u32 {
    self
      .votes
      .get(&(schema, mode))
      .and_then(|t| t.get(main))
      .and_then(|subs| subs.get(sub))
      .copied()
      .unwrap_or(0)
  }

  fn score(&self, schema: SchemaType, mode: LibMode, lib: &str) -> u32 {
    self.votes.get(&(schema, mode)).and_then(|t| t.get(lib)).map_or(0, |subs| subs.values().sum())
  }

  /// Best-effort order: most outgoing votes first, then each library is
  /// moved ahead of the first placed one it beats head to head. Cyclic
  /// votes are not detected.
  pub fn order(&self, keys: &[String], mode: LibMode, schema: SchemaType) -> Vec<String> {
    let mut scored: Vec<(&String, u32)> =
      keys.iter().map(|k| (k, self.score(schema, mode, k))).collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut placed: Vec<String> = Vec::with_capacity(keys.len());
    for (key, _) in scored {
      let before = placed.iter().position(|p| {
        self.count(schema, mode, key, p) > self.count(schema, mode, p, key)
      });
      match before {
        Some(pos) => placed.insert(pos, key.clone()),
        None => placed.push(key.clone()),
      }
    }
    placed
  }
}

/// A library ready to be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLib {
  Url(String),
  /// Path inside the widgets folder, resolved by the asset resolver.
  WidgetPath(String),
}

/// Render-scoped library collection.
#[derive(Debug, Default)]
pub struct LibraryResolver {
  tally: DependencyTally,
  css: Vec<LibraryRequest>,
  js: Vec<LibraryRequest>,
}

impl LibraryResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record the libraries one widget class asks for.
  pub fn request(&mut self, libs: &[LibraryRequest], mode: LibMode, widget_path: &str) {
    self.tally.record(libs, mode, SchemaType::Generic);
    let target = match mode {
      LibMode::Css => &mut self.css,
      LibMode::Js => &mut self.js,
    };
    target.extend(libs.iter().map(|lib| LibraryRequest { widget_path: widget_path.to_string(), ..lib.clone() }));
  }

  pub fn requests(&self, mode: LibMode) -> &[LibraryRequest] {
    match mode {
      LibMode::Css => &self.css,
      LibMode::Js => &self.js,
    }
  }

  pub fn tally(&self) -> &DependencyTally {
    &self.tally
  }

  /// Deduplicated, ordered libraries for `mode`. Local libraries keep the
  /// request whose path has the greatest leading version segment; others
  /// keep the highest requested version.
  pub fn generic_libs(&self, mode: LibMode) -> Vec<ResolvedLib> {
    let requests = self.requests(mode);
    let mut picks: Vec<Pick> = Vec::new();

    for req in requests {
      let candidate = match req.path.as_deref().filter(|_| req.kind == LibKind::Local) {
        Some(path) => Latest::Local {
          path: path.to_string(),
          widget_path: format!("{}/{mode}/{}", req.widget_path, req.lib),
        },
        None => Latest::Version(req.version.clone().unwrap_or_default()),
      };

      match picks.iter_mut().find(|p| p.lib == req.lib && p.latest.is_local() == candidate.is_local()) {
        Some(pick) => {
          if version_compare(pick.latest.rank(), candidate.rank()) == Ordering::Less {
            pick.latest = candidate;
          }
        }
        None => picks.push(Pick { lib: req.lib.clone(), latest: candidate }),
      }
    }

    let keys: Vec<String> = picks.iter().map(|p| p.key().to_string()).collect();
    let mut out = Vec::new();
    for key in self.tally.order(&keys, mode, SchemaType::Generic) {
      let Some(pick) = picks.iter().find(|p| p.key() == key) else { continue };
      match &pick.latest {
        Latest::Local { widget_path, .. } => out.push(ResolvedLib::WidgetPath(widget_path.clone())),
        Latest::Version(version) => {
          if let Some(url) = lib_url(requests, &pick.lib, version) {
            out.push(ResolvedLib::Url(url));
          }
        }
      }
    }
    out
  }
}

/// The request kept for one library.
#[derive(Debug, Clone)]
struct Pick {
  lib: String,
  latest: Latest,
}

impl Pick {
  /// Identity under the generic schema.
  fn key(&self) -> &str {
    match &self.latest {
      Latest::Local { path, .. } => path,
      Latest::Version(_) => &self.lib,
    }
  }
}

#[derive(Debug, Clone)]
enum Latest {
  Version(String),
  Local { path: String, widget_path: String },
}

impl Latest {
  fn is_local(&self) -> bool {
    matches!(self, Self::Local { .. })
  }

  fn rank(&self) -> &str {
    match self {
      Self::Version(version) => version,
      Self::Local { path, .. } => leading_segment(path),
    }
  }
}

fn leading_segment(path: &str) -> &str {
  path.split('/').next().unwrap_or(path)
}

/// URL of the first request for `lib` at `version`.
fn lib_url(requests: &[LibraryRequest], lib: &str, version: &str) -> Option<String> {
  requests
    .iter()
    .find(|r| r.lib == lib && r.version.as_deref().unwrap_or_default() == version)
    .and_then(|r| r.url.clone())
    .filter(|url| !url.is_empty())
}

/// Version ordering with the usual pre-release words:
/// `dev < alpha = a < beta = b < RC = rc < # < pl = p`.
pub fn version_compare(a: &str, b: &str) -> Ordering {
  let (a, b) = (version_parts(a), version_parts(b));
  for i in 0..a.len().max(b.len()) {
    let ord = match (a.get(i), b.get(i)) {
      (Some(x), Some(y)) => compare_part(x, y),
      (Some(x), None) => compare_part(x, &Part::Missing),
      (None, Some(y)) => compare_part(&Part::Missing, y),
      (None, None) => Ordering::Equal,
    };
    if ord != Ordering::Equal {
      return ord;
    }
  }
  Ordering::Equal
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
  Number(u64),
  Word(String),
  Missing,
}

fn version_parts(version: &str) -> Vec<Part> {
  let mut parts = Vec::new();
  let mut current = String::new();
  let mut digits = false;

  let mut flush = |current: &mut String, digits: bool| {
    if current.is_empty() {
      return;
    }
    let part = if digits {
      Part::Number(current.parse().unwrap_or(u64::MAX))
    } else {
      Part::Word(current.clone())
    };
    parts.push(part);
    current.clear();
  };

  for ch in version.chars() {
    if matches!(ch, '.' | '-' | '_' | '+') {
      flush(&mut current, digits);
      continue;
    }
    let is_digit = ch.is_ascii_digit();
    if !current.is_empty() && is_digit != digits {
      flush(&mut current, digits);
    }
    digits = is_digit;
    current.push(ch);
  }
  flush(&mut current, digits);
  parts
}

/// Rank of a part; numbers and missing parts sit between `RC` and `pl`.
fn rank(part: &Part) -> i8 {
  match part {
    Part::Word(w) => match w.as_str() {
      "dev" => 0,
      "alpha" | "a" => 1,
      "beta" | "b" => 2,
      "RC" | "rc" => 3,
      "pl" | "p" => 5,
      _ => -1,
    },
    Part::Number(_) | Part::Missing => 4,
  }
}

fn compare_part(a: &Part, b: &Part) -> Ordering {
  match (a, b) {
    (Part::Number(x), Part::Number(y)) => x.cmp(y),
    (Part::Number(_), Part::Missing) => Ordering::Greater,
    (Part::Missing, Part::Number(_)) => Ordering::Less,
    _ => rank(a).cmp(&rank(b)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lib(name: &str, version: &str) -> LibraryRequest {
    LibraryRequest {
      lib: name.into(),
      version: Some(version.into()),
      url: Some(format!("https://cdn.test/{name}@{version}.js")),
      ..Default::default()
    }
  }

  fn urls(libs: &[ResolvedLib]) -> Vec<&str> {
    libs
      .iter()
      .map(|l| match l {
        ResolvedLib::Url(u) | ResolvedLib::WidgetPath(u) => u.as_str(),
      })
      .collect()
  }

  #[test]
  fn votes_decide_order() {
    let mut resolver = LibraryResolver::new();
    resolver.request(&[lib("c", "1")], LibMode::Js, "W1");
    resolver.request(&[lib("b", "1"), lib("c", "1")], LibMode::Js, "W2");
    resolver.request(&[lib("a", "1"), lib("b", "1"), lib("c", "1")], LibMode::Js, "W3");

    assert_eq!(
      urls(&resolver.generic_libs(LibMode::Js)),
      vec!["https://cdn.test/a@1.js", "https://cdn.test/b@1.js", "https://cdn.test/c@1.js"]
    );
  }

  #[test]
  fn no_votes_keeps_first_seen_order() {
    let mut resolver = LibraryResolver::new();
    resolver.request(&[lib("z", "1")], LibMode::Css, "W1");
    resolver.request(&[lib("m", "1")], LibMode::Css, "W2");
    resolver.request(&[lib("a", "1")], LibMode::Css, "W3");

    let tally = resolver.tally();
    let keys: Vec<String> = ["z", "m", "a"].iter().map(ToString::to_string).collect();
    assert_eq!(tally.order(&keys, LibMode::Css, SchemaType::Generic), keys);
  }

  #[test]
  fn dedup_keeps_highest_version() {
    let mut resolver = LibraryResolver::new();
    resolver.request(&[lib("jquery", "1.2.0")], LibMode::Js, "W1");
    resolver.request(&[lib("jquery", "1.3.0")], LibMode::Js, "W2");

    assert_eq!(
      resolver.generic_libs(LibMode::Js),
      vec![ResolvedLib::Url("https://cdn.test/jquery@1.3.0.js".into())]
    );
  }

  #[test]
  fn local_libs_resolve_inside_widget_folder() {
    let local = LibraryRequest {
      lib: "slider.js".into(),
      path: Some("slider/1.0".into()),
      kind: LibKind::Local,
      ..Default::default()
    };
    let mut resolver = LibraryResolver::new();
    resolver.request(&[local], LibMode::Js, "Acme/Slider");

    assert_eq!(
      resolver.generic_libs(LibMode::Js),
      vec![ResolvedLib::WidgetPath("Acme/Slider/js/slider.js".into())]
    );
  }

  #[test]
  fn unknown_mode_is_an_error() {
    assert_eq!("css".parse::<LibMode>().unwrap(), LibMode::Css);
    assert_eq!("less".parse::<LibMode>().unwrap_err(), EngineError::UnknownLibraryMode("less".into()));
  }

  #[test]
  fn local_libs_keep_the_newest_path() {
    let swiper = |path: &str| LibraryRequest {
      lib: "swiper.js".into(),
      path: Some(path.into()),
      kind: LibKind::Local,
      ..Default::default()
    };
    let mut resolver = LibraryResolver::new();
    resolver.request(&[swiper("4.5.0/swiper.js"), lib("lodash", "4.17.0")], LibMode::Js, "A");
    resolver.request(&[swiper("5.0.1/swiper.js")], LibMode::Js, "B");
    resolver.request(&[swiper("4.9.0/swiper.js")], LibMode::Js, "C");

    assert_eq!(
      resolver.generic_libs(LibMode::Js),
      vec![
        ResolvedLib::WidgetPath("B/js/swiper.js".into()),
        ResolvedLib::Url("https://cdn.test/lodash@4.17.0.js".into()),
      ]
    );
  }

  #[test]
  fn standard_schema_votes_by_name() {
    let local = LibraryRequest {
      lib: "swiper".into(),
      path: Some("5.0.1/swiper.js".into()),
      kind: LibKind::Local,
      ..Default::default()
    };
    let mut tally = DependencyTally::default();
    tally.record(&[local.clone(), lib("lodash", "4")], LibMode::Js, SchemaType::Standard);
    tally.record(&[local, lib("lodash", "4")], LibMode::Js, SchemaType::Generic);

    assert_eq!(tally.count(SchemaType::Standard, LibMode::Js, "swiper", "lodash"), 1);
    assert_eq!(tally.count(SchemaType::Generic, LibMode::Js, "5.0.1/swiper.js", "lodash"), 1);
    assert_eq!(tally.count(SchemaType::Generic, LibMode::Js, "swiper", "lodash"), 0);
  }

  #[test]
  fn version_ordering() {
    assert_eq!(version_compare("1.2.0", "1.3.0"), Ordering::Less);
    assert_eq!(version_compare("1.10", "1.9"), Ordering::Greater);
    assert_eq!(version_compare("1.0", "1.0.0"), Ordering::Less);
    assert_eq!(version_compare("1.0rc1", "1.0"), Ordering::Less);
    assert_eq!(version_compare("1.0-beta", "1.0-alpha"), Ordering::Greater);
    assert_eq!(version_compare("2.0pl1", "2.0.1"), Ordering::Greater);
    assert_eq!(version_compare("", ""), Ordering::Equal);
  }
}

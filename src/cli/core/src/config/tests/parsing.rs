/* src/cli/core/src/config/tests/parsing.rs */

use super::*;

#[test]
fn parse_empty_config() {
  let config = parse_weft_config("").unwrap();
  assert_eq!(config.site.root, "site");
  assert_eq!(config.site.root_url, "/");
  assert!(config.site.default_website);
  assert_eq!(config.render.mode, RenderMode::Dynamic);
  assert_eq!(config.render.max_template_depth, 8);
  assert_eq!(config.log.level, "info");
}

#[test]
fn parse_full_config() {
  let toml_str = r#"
[site]
root = "content"
name = "demo"
default_website = false
root_url = "/demo/"

[render]
mode = "static"
max_template_depth = 3

[log]
level = "debug"
"#;
  let config = parse_weft_config(toml_str).unwrap();
  let options = config.site_options();
  assert_eq!(options.name, "demo");
  assert!(!options.default_website);
  assert_eq!(options.root_url, "/demo/");
  assert_eq!(options.mode, RenderMode::Static);
  assert_eq!(options.max_template_depth, 3);
  assert_eq!(config.log.level, "debug");
  assert_eq!(config.site_root(Path::new("/srv")), Path::new("/srv/content"));
}

#[test]
fn find_config_searching_upward() {
  let tmp = tempfile::tempdir().unwrap();
  let nested = tmp.path().join("site/pages/blog");
  std::fs::create_dir_all(&nested).unwrap();
  std::fs::write(tmp.path().join("weft.toml"), "[render]\nmode = \"static\"\n").unwrap();

  let found = find_weft_config(&nested).unwrap();
  assert_eq!(found, tmp.path().canonicalize().unwrap().join("weft.toml"));
  assert_eq!(load_weft_config(&found).unwrap().render.mode, RenderMode::Static);
}

#[test]
fn missing_config_file() {
  let tmp = tempfile::tempdir().unwrap();
  let err = load_weft_config(&tmp.path().join("weft.toml")).unwrap_err();
  assert!(err.to_string().starts_with("failed to read"));
}

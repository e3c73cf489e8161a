/* src/server/engine/rust/src/master.rs */

//! Master pages. A page naming a template in `params._template` takes the
//! template's content; widgets the template marks changeable may be
//! replaced by same-id widgets from the page, within their unlock rules.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::node::{
  CHANGEABLE_ATTR, CHANGED_ATTR, Content, DICTIONARY_PARAM, SUPERMASTER_ATTR, TEMPLATE_PARAM, WidgetNode,
};
use crate::site::Site;

pub struct MasterPageResolver<'a> {
  site: &'a Site,
}

impl<'a> MasterPageResolver<'a> {
  pub fn new(site: &'a Site) -> Self {
    Self { site }
  }

  /// Merge `page` into the content of master page `template`, resolving
  /// super-masters first.
  pub fn merge(&self, template: &str, page: WidgetNode) -> EngineResult<WidgetNode> {
    self.merge_chain(template, page, &mut Vec::new())
  }

  fn merge_chain(&self, template: &str, mut page: WidgetNode, chain: &mut Vec<String>) -> EngineResult<WidgetNode> {
    if chain.iter().any(|t| t == template) {
      chain.push(template.to_string());
      return Err(EngineError::TemplateCycle { chain: chain.join(" -> ") });
    }
    let max_depth = self.site.options.max_template_depth;
    if chain.len() >= max_depth {
      return Err(EngineError::TemplateDepth { template: template.to_string(), max_depth });
    }
    chain.push(template.to_string());
    debug!(template, depth = chain.len(), "resolving master page");

    let Some(mut master) = self.load(template)? else {
      warn!(template, "master page not found, rendering page without it");
      page.params.remove(TEMPLATE_PARAM);
      return Ok(page);
    };

    let supermaster = master.template().map(str::to_string);
    if let Some(name) = &supermaster {
      master = self.merge_chain(name, master, chain)?;
      append_master_dictionary(&mut master, name);
    }

    if let Some(data) = master.data.as_mut() {
      mark_changeable(data);
      apply_overrides(page.data.as_ref(), data);
    }
    let mut head = master.head.take().unwrap_or_default();
    for item in &mut head {
      mark_changeable(item);
    }
    let mut head = Content::List(head);
    apply_overrides(page.head.as_ref().map(|h| Content::List(h.clone())).as_ref(), &mut head);
    master.head = match head {
      Content::List(items) => Some(items),
      other => Some(vec![other]),
    };
    append_master_dictionary(&mut master, template);

    page.data = master.data;
    page.css = master.css;
    page.head = master.head;
    page.params.remove(TEMPLATE_PARAM);
    if let Some(name) = supermaster {
      page.attrs.insert(SUPERMASTER_ATTR.to_string(), Value::String(name));
    }
    Ok(page)
  }

  fn load(&self, template: &str) -> EngineResult<Option<WidgetNode>> {
    let Some(path) = self.site.settings.pages.file_path(template) else {
      return Ok(None);
    };
    match self.site.store.read_json(&path)? {
      Some(raw) => WidgetNode::from_value(&path, raw).map(Some),
      None => Ok(None),
    }
  }
}

fn is_match(node: &WidgetNode, id: &str) -> bool {
  node.is_widget() && node.id.as_deref() == Some(id)
}

/// Depth-first search for the widget with `id`.
pub fn find_widget<'c>(content: &'c Content, id: &str) -> Option<&'c WidgetNode> {
  match content {
    Content::Node(node) if is_match(node, id) => Some(node),
    Content::Node(node) => node.data.as_ref().and_then(|d| find_widget(d, id)),
    Content::List(items) => items.iter().find_map(|c| find_widget(c, id)),
    _ => None,
  }
}

/// Replace the first widget with `id`, or remove it when `with` is `None`.
pub fn replace_widget(content: &mut Content, id: &str, with: Option<&WidgetNode>) -> bool {
  if matches!(content, Content::Node(n) if is_match(n, id)) {
    *content = with.map_or_else(|| Content::List(Vec::new()), |n| Content::from(n.clone()));
    return true;
  }
  match content {
    Content::Node(node) => node.data.as_mut().is_some_and(|d| replace_widget(d, id, with)),
    Content::List(items) => {
      for i in 0..items.len() {
        if with.is_none() && matches!(&items[i], Content::Node(n) if is_match(n, id)) {
          items.remove(i);
          return true;
        }
        if replace_widget(&mut items[i], id, with) {
          return true;
        }
      }
      false
    }
    _ => false,
  }
}

/// Flag changeable widgets so editors can tell them apart.
pub fn mark_changeable(content: &mut Content) {
  match content {
    Content::Node(node) => {
      if node.is_widget() && node.sys_params.changeable {
        node.set_flag(CHANGEABLE_ATTR);
      }
      if let Some(data) = node.data.as_mut() {
        mark_changeable(data);
      }
    }
    Content::List(items) => items.iter_mut().for_each(mark_changeable),
    _ => {}
  }
}

fn collect_overrides<'c>(content: &'c Content, out: &mut Vec<&'c WidgetNode>) {
  match content {
    Content::Node(node) => {
      if node.id.as_deref().is_some_and(|id| !id.is_empty()) {
        out.push(node);
      }
      if let Some(data) = &node.data {
        collect_overrides(data, out);
      }
    }
    Content::List(items) => items.iter().for_each(|c| collect_overrides(c, out)),
    _ => {}
  }
}

/// Substitute page widgets for the changeable master widgets sharing their
/// id. Locked aspects keep the master's values. A page widget with an
/// empty class removes the master widget.
pub fn apply_overrides(page: Option<&Content>, master: &mut Content) {
  let Some(page) = page else { return };
  let mut overrides = Vec::new();
  collect_overrides(page, &mut overrides);

  for candidate in overrides {
    let Some(id) = candidate.id.as_deref() else { continue };
    let Some(section) = find_widget(master, id) else { continue };
    if !section.sys_params.changeable {
      continue;
    }

    if candidate.widget_class.as_deref() == Some("") {
      replace_widget(master, id, None);
      continue;
    }

    let unlock = section.sys_params.unlock_params;
    let mut value = candidate.clone();
    if !unlock.styling {
      if section.css.is_some() {
        value.css.clone_from(&section.css);
      }
      if section.custom_code.is_some() {
        value.custom_code.clone_from(&section.custom_code);
      }
    }
    if !unlock.themes && section.widget_styles.is_some() {
      value.widget_styles.clone_from(&section.widget_styles);
    }
    if !unlock.params && section.params.declared() {
      value.params.clone_from(&section.params);
    }
    value.set_flag(CHANGED_ATTR);
    replace_widget(master, id, Some(&value));
  }
}

fn append_master_dictionary(master: &mut WidgetNode, template: &str) {
  if let Some(data) = master.data.as_mut() {
    append_dictionary(data, template);
  }
  for item in master.head.iter_mut().flatten() {
    append_dictionary(item, template);
  }
}

/// Point widgets inherited from a master page at its dictionary. Widgets
/// already bound to a dictionary keep it.
pub fn append_dictionary(content: &mut Content, dictionary: &str) {
  match content {
    Content::Node(node) => {
      if node.has_flag(CHANGED_ATTR) || !node.is_widget() {
        return;
      }
      node
        .params
        .entry(DICTIONARY_PARAM)
        .or_insert_with(|| Value::String(dictionary.to_string()));
      if let Some(data) = node.data.as_mut() {
        append_dictionary(data, dictionary);
      }
    }
    Content::List(items) => items.iter_mut().for_each(|c| append_dictionary(c, dictionary)),
    _ => {}
  }
}

//! I/O 支持：网描述与分析结果的 JSON、RON 序列化接口，以及 PNML 网描述导入。
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::Net;
use crate::net::description::{NetDescription, NetError};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid net: {0}")]
    Net(#[from] NetError),
    #[cfg(feature = "pnml")]
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("pnml error: {0}")]
    Pnml(String),
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    let content = to_json_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_json_str(&read_to_string(path)?)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_ron_str(&read_to_string(path)?)
}

/// 读取网描述（`.ron` 按 RON、`.pnml` 按 PNML 解析，其余按 JSON）并完成结构校验。
///
/// 描述中未给出网名时，以文件名（去掉扩展名）命名。
pub fn load_net<P: AsRef<Path>>(path: P) -> Result<Net, IoError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let mut description: NetDescription = match ext.as_deref() {
        Some("ron") => read_ron(path)?,
        Some("pnml") => read_pnml(path)?,
        _ => read_json(path)?,
    };
    if description.name.is_none() {
        description.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    let net = description.build()?;
    log::info!(
        "loaded net '{}' from {:?}: {} places, {} transitions, {} arcs",
        net.name,
        path,
        net.places_len(),
        net.transitions_len(),
        net.arcs().len()
    );
    Ok(net)
}

#[cfg(feature = "pnml")]
fn read_pnml(path: &Path) -> Result<NetDescription, IoError> {
    pnml::parse_pnml(&read_to_string(path)?)
}

#[cfg(not(feature = "pnml"))]
fn read_pnml(path: &Path) -> Result<NetDescription, IoError> {
    Err(IoError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("{path:?}: PNML support requires the `pnml` feature"),
    )))
}

/// PNML 导入：只读取结构（库所、迁移、弧）与初始标识，忽略图形和名称。
#[cfg(feature = "pnml")]
pub mod pnml {
    use roxmltree::{Document, Node};

    use super::IoError;
    use crate::net::description::{
        ArcDescription, NetDescription, PlaceDescription, TransitionDescription,
    };
    use crate::net::structure::Weight;

    /// 解析文档中所有 `<net>` 元素，按出现顺序合并为一个网描述。
    ///
    /// 标签按本地名匹配，带或不带 PNML 命名空间均可。
    /// `initialMarking/text` 缺省为 0，非法或为负时报错；
    /// `inscription/text` 缺省为 1，非法或非正时按 1 处理。
    pub fn parse_pnml(content: &str) -> Result<NetDescription, IoError> {
        let document = Document::parse(content)?;
        let mut description = NetDescription::default();

        for net in elements(document.root(), "net") {
            for place in elements(net, "place") {
                let id = required_attribute(place, "id")?;
                let m0 = match labelled_text(place, "initialMarking") {
                    None => 0,
                    Some(text) => text.parse::<Weight>().map_err(|_| {
                        IoError::Pnml(format!("invalid initialMarking for place `{id}`: {text}"))
                    })?,
                };
                description.places.push(PlaceDescription { id, m0 });
            }
            for transition in elements(net, "transition") {
                let id = required_attribute(transition, "id")?;
                description.transitions.push(TransitionDescription { id });
            }
            for arc in elements(net, "arc") {
                let weight = labelled_text(arc, "inscription")
                    .and_then(|text| text.parse::<Weight>().ok())
                    .filter(|&weight| weight > 0)
                    .unwrap_or(1);
                description.arcs.push(ArcDescription {
                    id: arc.attribute("id").map(str::to_owned),
                    src: required_attribute(arc, "source")?,
                    target: required_attribute(arc, "target")?,
                    weight,
                });
            }
        }

        log::debug!(
            "pnml: {} places, {} transitions, {} arcs",
            description.places.len(),
            description.transitions.len(),
            description.arcs.len()
        );
        Ok(description)
    }

    fn elements<'a, 'input>(
        node: Node<'a, 'input>,
        name: &'static str,
    ) -> impl Iterator<Item = Node<'a, 'input>> {
        node.descendants()
            .filter(move |n| n.is_element() && n.tag_name().name() == name)
    }

    fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
        node.children()
            .find(|n| n.is_element() && n.tag_name().name() == name)
    }

    /// `<label><text>..</text></label>` 中去掉首尾空白的文本。
    fn labelled_text(node: Node<'_, '_>, label: &str) -> Option<String> {
        let text = child(child(node, label)?, "text")?;
        Some(text.text().unwrap_or_default().trim().to_owned())
    }

    fn required_attribute(node: Node<'_, '_>, name: &str) -> Result<String, IoError> {
        node.attribute(name).map(str::to_owned).ok_or_else(|| {
            IoError::Pnml(format!(
                "<{}> without `{}` attribute",
                node.tag_name().name(),
                name
            ))
        })
    }
}

fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

//! 记录与分页相关的数据模型

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

/// 一条抓取记录：字段名 → 字符串值
///
/// 字段集合由数据查询语句决定，这里不做校验。创建后不可修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// 从查询结果中的 JSON 对象转换
    ///
    /// 字符串原样保留，数字与布尔值转为字符串，`null` 字段省略。
    pub fn from_json_object(object: &serde_json::Map<String, JsonValue>) -> Self {
        let fields = object.iter().filter_map(|(name, value)| {
            let text = match value {
                JsonValue::Null => return None,
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), text))
        });
        Self::new(fields)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

/// 单页抽取结果，可以为空
pub type PageResult = Vec<Record>;

/// 当前页面的位置标识，仅用于判断翻页是否产生了新页面
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCursor(String);

impl SessionCursor {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }
}

impl fmt::Display for SessionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 上传请求体：`{"records": [{"fields": {...}}, ...]}`
#[derive(Debug, Serialize)]
pub struct UploadEnvelope<'a> {
    pub records: Vec<UploadEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct UploadEntry<'a> {
    pub fields: &'a Record,
}

impl<'a> UploadEnvelope<'a> {
    pub fn wrap(chunk: &'a [Record]) -> Self {
        Self {
            records: chunk.iter().map(|fields| UploadEntry { fields }).collect(),
        }
    }
}

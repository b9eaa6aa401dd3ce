//! 单页数据抽取
//!
//! 每页只发出一次数据查询，不做校验、过滤或去重。空页是合法结果。

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, QueryError};
use crate::models::{PageResult, Record};
use crate::query::{PageQuery, QuerySchema};

pub struct Extractor {
    schema: QuerySchema,
    list_name: String,
}

impl Extractor {
    /// 查询语句必须包含一个带字段的顶层列表节点
    pub fn new(schema_text: &str) -> AppResult<Self> {
        let schema = QuerySchema::parse(schema_text)?;
        let list = schema.first_list().ok_or_else(|| {
            AppError::Query(QueryError::UnexpectedShape(
                "数据查询语句缺少列表节点 (name[])".to_string(),
            ))
        })?;
        // 每个列表元素对应一条记录，没有字段就无法构成记录
        if list.children.is_empty() {
            return Err(AppError::Query(QueryError::UnexpectedShape(format!(
                "列表节点 {}[] 没有声明字段",
                list.name
            ))));
        }
        let list_name = list.name.clone();
        Ok(Self { schema, list_name })
    }

    pub async fn extract(&self, page: &dyn PageQuery) -> AppResult<PageResult> {
        info!("🔍 正在查询页面数据...");
        let response = page.query_data(&self.schema).await?;
        let records = self.to_records(&response)?;
        debug!("查询结果: {} 条记录", records.len());
        Ok(records)
    }

    fn to_records(&self, response: &JsonValue) -> AppResult<PageResult> {
        match response.get(&self.list_name) {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::Object(object) => Ok(Record::from_json_object(object)),
                    other => Err(AppError::Query(QueryError::UnexpectedShape(format!(
                        "{} 的元素不是对象: {}",
                        self.list_name, other
                    )))),
                })
                .collect(),
            Some(other) => Err(AppError::Query(QueryError::UnexpectedShape(format!(
                "{} 不是列表: {}",
                self.list_name, other
            )))),
        }
    }
}

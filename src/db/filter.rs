/// 图片表的查询条件
///
/// 写入条件中的字符串都会经过转义，避免破坏查询语句
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter<'a> {
    /// `name = '...'`
    NameEq(&'a str),
    /// 描述中包含指定文本
    DescriptionContains(&'a str),
}

impl Filter<'_> {
    pub fn to_sql(&self) -> String {
        match self {
            Self::NameEq(name) => format!("name = '{}'", sql_escape(name)),
            Self::DescriptionContains(text) => {
                let pattern = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
                format!("description LIKE '%{}%' ESCAPE '\\'", sql_escape(&pattern))
            }
        }
    }
}

/// 单引号转义为两个单引号
pub fn sql_escape(text: &str) -> String {
    text.replace('\'', "''")
}

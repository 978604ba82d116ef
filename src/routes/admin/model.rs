use serde::Serialize;

/// 删除操作的返回体，各资源共用
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: i32,
}

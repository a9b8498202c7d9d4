use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub code: i32,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            code: 200,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            code: 201,
        }
    }

    pub fn error(message: impl Into<String>, code: i32) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            code,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PageInfo {
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub pages: i64,
}

impl PageInfo {
    pub fn new(total: i64, page: i64, size: i64) -> Self {
        let pages = if size > 0 { (total + size - 1) / size } else { 0 };
        Self {
            total,
            page,
            size,
            pages,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, size: i64) -> Self {
        Self {
            items,
            pagination: PageInfo::new(total, page, size),
        }
    }
}

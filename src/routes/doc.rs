use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{DashboardStats, InventoryAdjustRequest},
        auth::{CustomerResponse, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest},
        cart::{AddCartItemRequest, CartItemResponse, CartResponse, UpdateCartItemRequest},
        orders::{
            CreateOrderRequest, DirectOrderItem, DirectOrderRequest, OrderItemResponse,
            OrderResponse, UpdateOrderStatusRequest,
        },
        products::{CategoryCount, CreateProductRequest, ProductResponse, UpdateProductRequest},
        tracking::{
            DeliveryEstimateResponse, TrackingEventResponse, TrackingResponse,
            TrackingSummaryResponse, TrackingUpdateRequest,
        },
    },
    models::{OrderStatus, PaymentMethod, ShippingAddress, TrackingStatus},
    response::{ApiResponse, PageInfo, Paginated},
    routes::{admin, auth, cart, health, orders, params, products, tracking},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::get_profile,
        auth::update_profile,
        products::search_products,
        products::get_product,
        products::list_categories,
        products::list_brands,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::create_order,
        orders::create_direct_order,
        orders::list_orders,
        orders::admin_list_orders,
        orders::get_order,
        orders::get_order_by_number,
        orders::update_order_status,
        orders::cancel_order,
        orders::archive_order,
        orders::delete_order,
        tracking::search_tracking,
        tracking::admin_search_tracking,
        tracking::tracking_summary,
        tracking::get_by_order,
        tracking::get_by_order_number,
        tracking::get_by_tracking_number,
        tracking::delivery_estimate,
        tracking::update_tracking,
        admin::dashboard,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            OrderStatus,
            TrackingStatus,
            PaymentMethod,
            ShippingAddress,
            CustomerResponse,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            ProductResponse,
            CreateProductRequest,
            UpdateProductRequest,
            CategoryCount,
            CartResponse,
            CartItemResponse,
            AddCartItemRequest,
            UpdateCartItemRequest,
            OrderResponse,
            OrderItemResponse,
            CreateOrderRequest,
            DirectOrderRequest,
            DirectOrderItem,
            UpdateOrderStatusRequest,
            TrackingResponse,
            TrackingEventResponse,
            TrackingUpdateRequest,
            TrackingSummaryResponse,
            DeliveryEstimateResponse,
            DashboardStats,
            InventoryAdjustRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::TrackingQuery,
            params::LowStockQuery,
            PageInfo,
            ApiResponse<ProductResponse>,
            ApiResponse<OrderResponse>,
            ApiResponse<TrackingResponse>,
            ApiResponse<CartResponse>,
            Paginated<ProductResponse>,
            Paginated<OrderResponse>,
            Paginated<TrackingResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Tracking", description = "Shipment tracking endpoints"),
        (name = "Admin", description = "Administrative endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

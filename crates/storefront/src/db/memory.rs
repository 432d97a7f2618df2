//! In-process implementation of the repository traits.
//!
//! Mirrors the `PostgreSQL` behaviour closely enough for router and service
//! tests: unique constraints, the single-default-address rule, and
//! all-or-nothing stock reservation at checkout. One mutex guards all tables,
//! so every operation is atomic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use driftwood_core::{
    AddressId, CategoryId, Email, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId,
    UserId, UserRole,
};

use super::{
    AddressRepository, CatalogRepository, CreateOrderError, HealthCheck, InventoryRepository,
    OrderRepository, RepositoryError, UserRepository,
};
use crate::models::{
    Address, AddressInput, Category, NewCategory, NewOrder, NewProduct, NewUser, Order,
    OrderFilter, OrderItem, Product, ProductFilter, StatisticsScope, StatusSummary, User,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    users: BTreeMap<UserId, (User, String)>,
    addresses: BTreeMap<AddressId, Address>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
}

impl Tables {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn user_addresses(&mut self, user_id: UserId) -> impl Iterator<Item = &mut Address> {
        self.addresses
            .values_mut()
            .filter(move |a| a.user_id == user_id)
    }

    fn make_default(&mut self, user_id: UserId, id: AddressId) {
        let now = Utc::now();
        for address in self.user_addresses(user_id) {
            let is_target = address.id == id;
            if address.is_default != is_target {
                address.is_default = is_target;
                address.updated_at = now;
            }
        }
    }
}

/// Repositories backed by in-process maps.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|(u, _)| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let created = User {
            id: UserId::new(tables.next_id()),
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .insert(created.id, (created.clone(), user.password_hash));
        Ok(created)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.lock().users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn get_credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|(u, _)| &u.email == email)
            .cloned())
    }

    async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock();
        let (user, _) = tables
            .users
            .values_mut()
            .find(|(u, _)| &u.email == email)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl AddressRepository for InMemoryStore {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let mut addresses: Vec<Address> = self
            .tables
            .lock()
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(addresses)
    }

    async fn get(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        Ok(self.tables.lock().addresses.get(&id).cloned())
    }

    async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .addresses
            .values()
            .find(|a| a.user_id == user_id && a.is_default)
            .cloned())
    }

    async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tables = self.tables.lock();
        let first = tables.user_addresses(user_id).next().is_none();
        let now = Utc::now();
        let address = Address {
            id: AddressId::new(tables.next_id()),
            user_id,
            full_name: input.full_name.clone(),
            line1: input.line1.clone(),
            line2: input.line2.clone(),
            city: input.city.clone(),
            region: input.region.clone(),
            postal_code: input.postal_code.clone(),
            country: input.country.clone(),
            phone: input.phone.clone(),
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        let id = address.id;
        tables.addresses.insert(id, address);
        if first || input.is_default {
            tables.make_default(user_id, id);
        }
        tables
            .addresses
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tables = self.tables.lock();
        let address = tables
            .addresses
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        address.full_name.clone_from(&input.full_name);
        address.line1.clone_from(&input.line1);
        address.line2.clone_from(&input.line2);
        address.city.clone_from(&input.city);
        address.region.clone_from(&input.region);
        address.postal_code.clone_from(&input.postal_code);
        address.country.clone_from(&input.country);
        address.phone.clone_from(&input.phone);
        address.updated_at = Utc::now();
        let user_id = address.user_id;
        if input.is_default {
            tables.make_default(user_id, id);
        }
        tables
            .addresses
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: AddressId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock();
        let removed = tables
            .addresses
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;

        for order in tables.orders.values_mut() {
            if order.address_id == Some(id) {
                order.address_id = None;
            }
        }

        if removed.is_default {
            let successor = tables
                .addresses
                .values()
                .filter(|a| a.user_id == removed.user_id)
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                .map(|a| a.id);
            if let Some(successor) = successor {
                tables.make_default(removed.user_id, successor);
            }
        }
        Ok(())
    }

    async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tables = self.tables.lock();
        match tables.addresses.get(&id) {
            Some(address) if address.user_id == user_id => {}
            _ => return Err(RepositoryError::NotFound),
        }
        tables.make_default(user_id, id);
        tables
            .addresses
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> =
            self.tables.lock().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, RepositoryError> {
        let mut tables = self.tables.lock();
        if tables.categories.values().any(|c| c.slug == category.slug) {
            return Err(RepositoryError::Conflict(
                "category slug already exists".to_owned(),
            ));
        }
        let created = Category {
            id: CategoryId::new(tables.next_id()),
            slug: category.slug.clone(),
            name: category.name.clone(),
        };
        tables.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock();
        let category_id = match &filter.category {
            Some(slug) => match tables.categories.values().find(|c| &c.slug == slug) {
                Some(category) => Some(category.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| p.active || filter.include_inactive)
            .filter(|p| category_id.is_none() || p.category_id == category_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.lock().products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock();
        Ok(tables
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock();
        if tables.products.values().any(|p| p.slug == product.slug) {
            return Err(RepositoryError::Conflict(
                "product slug already exists".to_owned(),
            ));
        }
        let now = Utc::now();
        let created = Product {
            id: ProductId::new(tables.next_id()),
            category_id: product.category_id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            active: product.active,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_stock(&self, id: ProductId, stock: i32) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock();
        let product = tables
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        product.stock = stock;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn release_stock(&self, lines: &[(ProductId, i32)]) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        for (product_id, quantity) in lines {
            if let Some(product) = tables.products.get_mut(product_id) {
                product.stock += quantity;
                product.updated_at = now;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, CreateOrderError> {
        let mut tables = self.tables.lock();

        if tables
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(CreateOrderError::DuplicateOrderNumber);
        }
        if let Some(key) = &order.idempotency_key
            && tables.orders.values().any(|o| {
                o.user_id == order.user_id && o.idempotency_key.as_deref() == Some(key.as_str())
            })
        {
            return Err(CreateOrderError::DuplicateIdempotencyKey);
        }

        // Check every line before touching stock so a shortfall writes nothing.
        for line in &order.items {
            let available = tables.products.get(&line.product_id).map_or(0, |p| p.stock);
            if available < line.quantity {
                return Err(CreateOrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                });
            }
        }

        let now = Utc::now();
        for line in &order.items {
            if let Some(product) = tables.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
                product.updated_at = now;
            }
        }

        let id = OrderId::new(tables.next_id());
        let items = order
            .items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(tables.next_id()),
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                line_total: item.line_total,
            })
            .collect();

        let created = Order {
            id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            subtotal: order.totals.subtotal,
            tax: order.totals.tax,
            shipping: order.totals.shipping,
            total: order.totals.total,
            address_id: order.address_id,
            shipping_address: order.shipping_address,
            idempotency_key: order.idempotency_key,
            items,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn order_number_exists(&self, number: &OrderNumber) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .any(|o| &o.order_number == number))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        self.list(OrderFilter {
            status: None,
            user_id: Some(user_id),
        })
        .await
    }

    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .tables
            .lock()
            .orders
            .values()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == u))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.tables.lock();
        match tables.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn status_summary(
        &self,
        scope: StatisticsScope,
    ) -> Result<Vec<StatusSummary>, RepositoryError> {
        let tables = self.tables.lock();
        let mut summaries: Vec<StatusSummary> = Vec::new();
        for order in tables
            .orders
            .values()
            .filter(|o| scope.contains(o.user_id, o.created_at))
        {
            match summaries.iter_mut().find(|s| s.status == order.status) {
                Some(summary) => {
                    summary.count += 1;
                    summary.total += order.total;
                }
                None => summaries.push(StatusSummary {
                    status: order.status,
                    count: 1,
                    total: order.total,
                }),
            }
        }
        Ok(summaries)
    }
}

#[async_trait]
impl HealthCheck for InMemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

use crate::entities::{appointment, client, user};

/// Seeds the totals gauges from the database. Handlers adjust them afterwards.
pub async fn init_metrics(db: &DatabaseConnection) {
    let user_count = user::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("physio_users_total").set(user_count as f64);

    let client_count = client::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("physio_clients_total").set(client_count as f64);

    let appointment_count = appointment::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("physio_appointments_total").set(appointment_count as f64);

    tracing::info!(
        "Initialized metrics: Users={}, Clients={}, Appointments={}",
        user_count, client_count, appointment_count
    );
}

/// A deleted client takes its appointments with it.
pub fn client_removed(appointment_count: u64) {
    metrics::gauge!("physio_clients_total").decrement(1.0);
    metrics::gauge!("physio_appointments_total").decrement(appointment_count as f64);
}

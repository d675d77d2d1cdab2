//! Circulation tests against a scratch database
//!
//! `#[sqlx::test]` creates a fresh database per test from `DATABASE_URL`
//! and applies `./migrations`. Run with `cargo test -- --ignored`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{Duration as Days, Utc};
use sqlx::PgPool;

use libraryhub_server::{
    error::ErrorCode,
    models::{
        book::UpdateBook, borrow::RequestBorrow, student::UpdateStudent, Role, User, UserClaims,
    },
    repository::Repository,
    services::{email::Mailer, Services},
    AppConfig, AppError, AppResult,
};

struct NoMail;

#[async_trait]
impl Mailer for NoMail {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> AppResult<()> {
        Ok(())
    }
}

fn services(pool: &PgPool) -> Services {
    Services::new(
        Repository::new(pool.clone()),
        &AppConfig::default(),
        Arc::new(NoMail),
    )
}

async fn centre(pool: &PgPool, code: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO centres (name, centre_code) VALUES ($1, $1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn user(pool: &PgPool, email: &str, role: Role, centre_id: i32) -> User {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password, role, centre_id) VALUES ($1, 'x', $2, $3) RETURNING *",
    )
    .bind(email)
    .bind(role.to_string())
    .bind(centre_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn book(pool: &PgPool, code: &str, total: i32, available: i32, centre_id: i32) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO books (title, book_code, total_copies, available_copies, centre_id)
        VALUES ($1, $1, $2, $3, $4) RETURNING id
        "#,
    )
    .bind(code)
    .bind(total)
    .bind(available)
    .bind(centre_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn issued(pool: &PgPool, book_id: i32, user_id: i32, issued_days_ago: i64, due_in_days: i64) -> i32 {
    let now = Utc::now();
    sqlx::query_scalar(
        r#"
        INSERT INTO borrows (book_id, user_id, status, issue_date, due_date)
        VALUES ($1, $2, 'issued', $3, $4) RETURNING id
        "#,
    )
    .bind(book_id)
    .bind(user_id)
    .bind(now - Days::days(issued_days_ago))
    .bind(now + Days::days(due_in_days))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn available_copies(pool: &PgPool, book_id: i32) -> i32 {
    sqlx::query_scalar("SELECT available_copies FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn concurrent_requests_respect_borrow_limit(pool: PgPool) {
    let services = services(&pool);
    let centre_id = centre(&pool, "C1").await;
    let student = user(&pool, "pupil@school.test", Role::Student, centre_id).await;
    let first = book(&pool, "AT-1", 1, 1, centre_id).await;
    let second = book(&pool, "GL-1", 1, 1, centre_id).await;
    let claims = UserClaims::new(&student, 24);

    let request = |book_id| RequestBorrow {
        book_id,
        notes: None,
    };
    let (a, b) = tokio::join!(
        services.circulation.request_borrow(&claims, request(first)),
        services.circulation.request_borrow(&claims, request(second)),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::BusinessRule(ErrorCode::BorrowLimitReached, _))
    )));

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrows WHERE user_id = $1")
        .bind(student.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn forced_delete_returns_copies_to_the_queue(pool: PgPool) {
    let services = services(&pool);
    let centre_id = centre(&pool, "C1").await;
    let leaver = user(&pool, "leaver@school.test", Role::Student, centre_id).await;
    let waiting = user(&pool, "waiting@school.test", Role::Student, centre_id).await;
    let book_id = book(&pool, "AT-1", 1, 0, centre_id).await;
    issued(&pool, book_id, leaver.id, 1, 2).await;
    let reservation_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO reservations (book_id, user_id, centre_id, expiry_date)
        VALUES ($1, $2, $3, NOW() + INTERVAL '7 days') RETURNING id
        "#,
    )
    .bind(book_id)
    .bind(waiting.id)
    .bind(centre_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert!(matches!(
        services.users.delete_user(leaver.id, false).await,
        Err(AppError::Conflict(_))
    ));
    services.users.delete_user(leaver.id, true).await.unwrap();

    assert_eq!(available_copies(&pool, book_id).await, 1);
    let notified: bool = sqlx::query_scalar("SELECT notified FROM reservations WHERE id = $1")
        .bind(reservation_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(notified);
    let announcements: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND notification_type = 'book_available'",
    )
    .bind(waiting.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(announcements, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn book_edit_waits_for_issue_in_flight(pool: PgPool) {
    let repository = Repository::new(pool.clone());
    let centre_id = centre(&pool, "C1").await;
    let book_id = book(&pool, "AT-1", 3, 3, centre_id).await;

    // An issue holding the row lock
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .unwrap();
    sqlx::query("UPDATE books SET available_copies = available_copies - 1 WHERE id = $1")
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .unwrap();

    let edit = tokio::spawn({
        let repository = repository.clone();
        async move {
            let update = UpdateBook {
                title: Some("Atlas, second edition".into()),
                ..Default::default()
            };
            repository.books.update(book_id, &update).await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.commit().await.unwrap();

    let edited = edit.await.unwrap().unwrap();
    assert_eq!(edited.title, "Atlas, second edition");
    assert_eq!(edited.available_copies, 2);
    assert_eq!(available_copies(&pool, book_id).await, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn overdue_reminder_sent_once_per_day(pool: PgPool) {
    let services = services(&pool);
    let centre_id = centre(&pool, "C1").await;
    let student = user(&pool, "late@school.test", Role::Student, centre_id).await;
    let book_id = book(&pool, "AT-1", 1, 0, centre_id).await;
    issued(&pool, book_id, student.id, 10, -3).await;

    let now = Utc::now();
    assert_eq!(services.maintenance.run_once(now).await.unwrap().overdue_reminders, 1);

    // Clearing the inbox must not re-arm today's reminder
    services.notifications.clear_all(student.id).await.unwrap();
    assert_eq!(services.maintenance.run_once(now).await.unwrap().overdue_reminders, 0);

    let tomorrow = now + Days::days(1);
    assert_eq!(services.maintenance.run_once(tomorrow).await.unwrap().overdue_reminders, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn issued_books_list_newest_first(pool: PgPool) {
    let repository = Repository::new(pool.clone());
    let centre_id = centre(&pool, "C1").await;
    let teacher = user(&pool, "teacher@school.test", Role::Teacher, centre_id).await;
    let old = book(&pool, "AT-1", 1, 0, centre_id).await;
    let new = book(&pool, "GL-1", 1, 0, centre_id).await;
    let middle = book(&pool, "MP-1", 1, 0, centre_id).await;
    issued(&pool, old, teacher.id, 9, 5).await;
    issued(&pool, new, teacher.id, 1, 5).await;
    issued(&pool, middle, teacher.id, 4, 5).await;

    let order: Vec<i32> = repository
        .borrows
        .issued_to(teacher.id)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.book_id)
        .collect();
    assert_eq!(order, vec![new, middle, old]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn student_follows_school_to_new_centre(pool: PgPool) {
    let services = services(&pool);
    let north = centre(&pool, "NORTH").await;
    let south = centre(&pool, "SOUTH").await;
    let school_in = |centre_id: i32, name: &'static str| {
        let pool = pool.clone();
        async move {
            sqlx::query_scalar::<_, i32>(
                "INSERT INTO schools (name, centre_id) VALUES ($1, $2) RETURNING id",
            )
            .bind(name)
            .bind(centre_id)
            .fetch_one(&pool)
            .await
            .unwrap()
        }
    };
    let north_school = school_in(north, "Pangani School").await;
    let south_school = school_in(south, "Tanga School").await;
    let student_id: i32 = sqlx::query_scalar(
        "INSERT INTO students (name, centre_id, school_id) VALUES ('Amina', $1, $2) RETURNING id",
    )
    .bind(north)
    .bind(north_school)
    .fetch_one(&pool)
    .await
    .unwrap();

    let librarian = user(&pool, "librarian@north.test", Role::Librarian, north).await;
    let move_south = || UpdateStudent {
        school_id: Some(south_school),
        ..Default::default()
    };
    assert!(matches!(
        services
            .students
            .update(&UserClaims::new(&librarian, 24), student_id, move_south())
            .await,
        Err(AppError::Authorization(_))
    ));

    let admin = user(&pool, "admin@libraryhub.test", Role::Admin, north).await;
    let moved = services
        .students
        .update(&UserClaims::new(&admin, 24), student_id, move_south())
        .await
        .unwrap();
    assert_eq!(moved.school_id, Some(south_school));
    assert_eq!(moved.centre_id, Some(south));
}

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{MatchChanges, MatchStore, NewMatch};
use crate::api_error::{ApiError, ErrorCode};
use crate::db::DbPool;
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::match_model::{
    Match, MatchDetails, MatchQuery, MatchScope, MatchSet, MatchStatus, Team, TeamWithPlayers,
    MATCH_CAPACITY, TEAM_CAPACITY,
};
use crate::models::player::Player;
use crate::service::team_composer::TeamDraft;

const MATCH_COLUMNS: &str = r#"
    m.id, m.date_time, m.location, m.description, m.duration, m.points_deviation,
    m.category_id, m.gender_id, m.creator_player_id, m.status, m.created_at
"#;

const PLAYER_COLUMNS: &str =
    "p.id, p.user_id, p.display_name, p.gender_id, p.category_id, p.position, p.phone";

const APPLICATION_COLUMNS: &str =
    "id, match_id, player_id, team_number, message, phone, status, created_at";

#[derive(FromRow)]
struct TeamPlayerRow {
    team_id: Uuid,
    #[sqlx(flatten)]
    player: Player,
}

#[derive(FromRow)]
struct RosterRow {
    match_id: Uuid,
    #[sqlx(flatten)]
    player: Player,
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgMatchStore {
    pool: DbPool,
}

impl PgMatchStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Attach teams, roster, sets and (for the listed ids) pending applications
/// to a batch of match rows, preserving their order.
async fn load_details(
    conn: &mut PgConnection,
    matches: Vec<Match>,
    with_applications: &[Uuid],
) -> Result<Vec<MatchDetails>, ApiError> {
    if matches.is_empty() {
        return Ok(vec![]);
    }
    let match_ids: Vec<Uuid> = matches.iter().map(|m| m.id).collect();

    let teams: Vec<Team> = sqlx::query_as(
        r#"
        SELECT id, match_id, team_number
        FROM teams
        WHERE match_id = ANY($1)
        ORDER BY team_number ASC
        "#,
    )
    .bind(&match_ids)
    .fetch_all(&mut *conn)
    .await?;

    let team_ids: Vec<Uuid> = teams.iter().map(|t| t.id).collect();
    let team_players: Vec<TeamPlayerRow> = sqlx::query_as(&format!(
        r#"
        SELECT tp.team_id, {PLAYER_COLUMNS}
        FROM team_players tp
        JOIN players p ON p.id = tp.player_id
        WHERE tp.team_id = ANY($1)
        ORDER BY tp.added_at ASC
        "#
    ))
    .bind(&team_ids)
    .fetch_all(&mut *conn)
    .await?;

    let roster: Vec<RosterRow> = sqlx::query_as(&format!(
        r#"
        SELECT mp.match_id, {PLAYER_COLUMNS}
        FROM match_players mp
        JOIN players p ON p.id = mp.player_id
        WHERE mp.match_id = ANY($1)
        ORDER BY mp.added_at ASC
        "#
    ))
    .bind(&match_ids)
    .fetch_all(&mut *conn)
    .await?;

    let sets: Vec<MatchSet> = sqlx::query_as(
        r#"
        SELECT id, match_id, set_number, team1_score, team2_score
        FROM match_sets
        WHERE match_id = ANY($1)
        ORDER BY set_number ASC
        "#,
    )
    .bind(&match_ids)
    .fetch_all(&mut *conn)
    .await?;

    let applications: Vec<Application> = if with_applications.is_empty() {
        vec![]
    } else {
        sqlx::query_as(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            WHERE match_id = ANY($1) AND status = $2
            ORDER BY created_at ASC
            "#
        ))
        .bind(with_applications)
        .bind(ApplicationStatus::Pending)
        .fetch_all(&mut *conn)
        .await?
    };

    let mut players_by_team: HashMap<Uuid, Vec<Player>> = HashMap::new();
    for row in team_players {
        players_by_team.entry(row.team_id).or_default().push(row.player);
    }
    let mut teams_by_match: HashMap<Uuid, Vec<TeamWithPlayers>> = HashMap::new();
    for team in teams {
        let players = players_by_team.remove(&team.id).unwrap_or_default();
        teams_by_match
            .entry(team.match_id)
            .or_default()
            .push(TeamWithPlayers { team, players });
    }
    let mut roster_by_match: HashMap<Uuid, Vec<Player>> = HashMap::new();
    for row in roster {
        roster_by_match.entry(row.match_id).or_default().push(row.player);
    }
    let mut sets_by_match: HashMap<Uuid, Vec<MatchSet>> = HashMap::new();
    for set in sets {
        sets_by_match.entry(set.match_id).or_default().push(set);
    }
    let mut applications_by_match: HashMap<Uuid, Vec<Application>> = HashMap::new();
    for application in applications {
        applications_by_match
            .entry(application.match_id)
            .or_default()
            .push(application);
    }

    Ok(matches
        .into_iter()
        .map(|m| MatchDetails {
            teams: teams_by_match.remove(&m.id).unwrap_or_default(),
            players: roster_by_match.remove(&m.id).unwrap_or_default(),
            sets: sets_by_match.remove(&m.id).unwrap_or_default(),
            applications: applications_by_match.remove(&m.id).unwrap_or_default(),
            match_data: m,
        })
        .collect())
}

async fn ensure_players_exist(conn: &mut PgConnection, player_ids: &[Uuid]) -> Result<(), ApiError> {
    if player_ids.is_empty() {
        return Ok(());
    }
    let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM players WHERE id = ANY($1)")
        .bind(player_ids)
        .fetch_all(&mut *conn)
        .await?;
    match player_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(ApiError::domain(
            ErrorCode::NoPlayer,
            format!("No existing player with id: {}", missing),
        )),
        None => Ok(()),
    }
}

/// Create the draft's guests and link every player to the team and roster.
async fn fill_team(
    conn: &mut PgConnection,
    match_id: Uuid,
    team_id: Uuid,
    draft: TeamDraft,
) -> Result<(), ApiError> {
    if draft.is_empty() {
        return Ok(());
    }
    debug!(team_id = %team_id, players = draft.len(), "Filling team");
    ensure_players_exist(conn, &draft.existing_players).await?;

    let mut player_ids = draft.existing_players;
    for guest in draft.guests {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO players (id, user_id, display_name, gender_id, category_id, position, phone)
            VALUES ($1, NULL, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&guest.display_name)
        .bind(guest.gender_id)
        .bind(guest.category_id)
        .bind(&guest.position)
        .bind(&guest.phone)
        .execute(&mut *conn)
        .await?;
        player_ids.push(id);
    }

    for player_id in player_ids {
        link_player(conn, match_id, team_id, player_id).await?;
    }
    Ok(())
}

async fn link_player(
    conn: &mut PgConnection,
    match_id: Uuid,
    team_id: Uuid,
    player_id: Uuid,
) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO team_players (team_id, player_id) VALUES ($1, $2)")
        .bind(team_id)
        .bind(player_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO match_players (match_id, player_id) VALUES ($1, $2)")
        .bind(match_id)
        .bind(player_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Capacity-checked connect; callers run it inside a transaction. The match
/// row is locked first so concurrent roster writers on one match serialize.
/// A pending match is closed in the same transaction once its roster is full.
async fn connect_player(
    conn: &mut PgConnection,
    match_id: Uuid,
    team_number: i16,
    player_id: Uuid,
) -> Result<usize, ApiError> {
    let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM matches WHERE id = $1 FOR UPDATE")
        .bind(match_id)
        .fetch_optional(&mut *conn)
        .await?;
    if locked.is_none() {
        return Err(ApiError::no_match(match_id));
    }

    let team_id: Uuid = sqlx::query_scalar(
        "SELECT id FROM teams WHERE match_id = $1 AND team_number = $2 FOR UPDATE",
    )
    .bind(match_id)
    .bind(team_number)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::no_match(match_id))?;

    ensure_players_exist(conn, &[player_id]).await?;

    let already_in: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM match_players WHERE match_id = $1 AND player_id = $2)",
    )
    .bind(match_id)
    .bind(player_id)
    .fetch_one(&mut *conn)
    .await?;
    if already_in {
        return Err(ApiError::domain(
            ErrorCode::PlayerAlreadyInMatch,
            "Player is already in the match",
        ));
    }

    let team_size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM team_players WHERE team_id = $1")
        .bind(team_id)
        .fetch_one(&mut *conn)
        .await?;
    if team_size as usize >= TEAM_CAPACITY {
        return Err(ApiError::team_full());
    }

    link_player(conn, match_id, team_id, player_id).await?;

    let roster_size: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM match_players WHERE match_id = $1")
        .bind(match_id)
        .fetch_one(&mut *conn)
        .await?;
    let roster_size = roster_size as usize;

    if roster_size >= MATCH_CAPACITY {
        sqlx::query("UPDATE matches SET status = $1 WHERE id = $2 AND status = $3")
            .bind(MatchStatus::Closed)
            .bind(match_id)
            .bind(MatchStatus::Pending)
            .execute(&mut *conn)
            .await?;
    }
    Ok(roster_size)
}

fn push_match_filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a MatchQuery) {
    let filters = &query.filters;
    builder
        .push(" WHERE m.status = ")
        .push_bind(MatchStatus::Pending.to_string());

    if !filters.genders.is_empty() {
        builder
            .push(" AND m.gender_id = ANY(")
            .push_bind(filters.genders.clone())
            .push(")");
    }
    if !filters.statuses.is_empty() {
        let statuses: Vec<String> = filters.statuses.iter().map(|s| s.to_string()).collect();
        builder.push(" AND m.status = ANY(").push_bind(statuses).push(")");
    }

    if let MatchScope::Player {
        player_id,
        created_by,
        is_player,
    } = query.scope
    {
        builder.push(" AND (FALSE");
        if created_by {
            builder
                .push(" OR m.creator_player_id = ")
                .push_bind(player_id);
        }
        if is_player {
            builder
                .push(" OR EXISTS (SELECT 1 FROM match_players mp WHERE mp.match_id = m.id AND mp.player_id = ")
                .push_bind(player_id)
                .push(")");
        }
        builder.push(")");
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn health_check(&self) -> Result<(), ApiError> {
        crate::db::health_check(&self.pool).await
    }

    async fn create_match(&self, new_match: NewMatch) -> Result<MatchDetails, ApiError> {
        let mut tx = self.pool.begin().await?;
        ensure_players_exist(&mut tx, &[new_match.creator_player_id]).await?;

        let match_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO matches (
                id, date_time, location, description, duration, points_deviation,
                category_id, gender_id, creator_player_id, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(match_id)
        .bind(new_match.date_time)
        .bind(&new_match.location)
        .bind(&new_match.description)
        .bind(new_match.duration)
        .bind(new_match.points_deviation)
        .bind(new_match.category_id)
        .bind(new_match.gender_id)
        .bind(new_match.creator_player_id)
        .bind(new_match.status)
        .execute(&mut *tx)
        .await?;

        for draft in new_match.teams {
            let team_id = Uuid::new_v4();
            sqlx::query("INSERT INTO teams (id, match_id, team_number) VALUES ($1, $2, $3)")
                .bind(team_id)
                .bind(match_id)
                .bind(draft.team_number)
                .execute(&mut *tx)
                .await?;
            fill_team(&mut tx, match_id, team_id, draft).await?;
        }

        tx.commit().await?;
        debug!(match_id = %match_id, "Match rows inserted");

        self.find_match(match_id)
            .await?
            .ok_or_else(|| ApiError::internal_error("Created match could not be read back"))
    }

    async fn find_match(&self, match_id: Uuid) -> Result<Option<MatchDetails>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<Match> = sqlx::query_as(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches m WHERE m.id = $1"
        ))
        .bind(match_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(m) => Ok(load_details(&mut conn, vec![m], &[match_id]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_matches(&self, query: &MatchQuery) -> Result<(Vec<MatchDetails>, i64), ApiError> {
        let mut tx = self.pool.begin().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM matches m");
        push_match_filter(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {MATCH_COLUMNS} FROM matches m"));
        push_match_filter(&mut select, query);
        match query.scope {
            MatchScope::Open => select.push(" ORDER BY m.date_time ASC"),
            MatchScope::Player { .. } => select.push(" ORDER BY m.created_at DESC"),
        };
        select
            .push(" LIMIT ")
            .push_bind(query.filters.page_size as i64)
            .push(" OFFSET ")
            .push_bind(query.filters.offset());
        let rows: Vec<Match> = select.build_query_as().fetch_all(&mut *tx).await?;

        let with_applications: Vec<Uuid> = match query.scope {
            MatchScope::Player {
                player_id,
                created_by: true,
                ..
            } => rows
                .iter()
                .filter(|m| m.creator_player_id == player_id)
                .map(|m| m.id)
                .collect(),
            _ => vec![],
        };
        let details = load_details(&mut tx, rows, &with_applications).await?;

        tx.commit().await?;
        Ok((details, total))
    }

    async fn update_match(&self, match_id: Uuid, changes: &MatchChanges) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE matches
            SET date_time = COALESCE($2, date_time),
                location = COALESCE($3, location),
                description = COALESCE($4, description),
                duration = COALESCE($5, duration),
                points_deviation = COALESCE($6, points_deviation),
                category_id = COALESCE($7, category_id),
                gender_id = COALESCE($8, gender_id)
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .bind(changes.date_time)
        .bind(&changes.location)
        .bind(&changes.description)
        .bind(changes.duration)
        .bind(changes.points_deviation)
        .bind(changes.category_id)
        .bind(changes.gender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_teams(&self, match_id: Uuid, teams: Vec<TeamDraft>) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM matches WHERE id = $1 FOR UPDATE")
            .bind(match_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(ApiError::no_match(match_id));
        }

        sqlx::query(
            "DELETE FROM team_players WHERE team_id IN (SELECT id FROM teams WHERE match_id = $1)",
        )
        .bind(match_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM match_players WHERE match_id = $1")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

        for draft in teams {
            let team_id: Uuid =
                sqlx::query_scalar("SELECT id FROM teams WHERE match_id = $1 AND team_number = $2")
                    .bind(match_id)
                    .bind(draft.team_number)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| ApiError::no_match(match_id))?;
            fill_team(&mut tx, match_id, team_id, draft).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_match_status(&self, match_id: Uuid, status: MatchStatus) -> Result<bool, ApiError> {
        let result = sqlx::query("UPDATE matches SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(match_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_player_to_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<usize, ApiError> {
        let mut tx = self.pool.begin().await?;
        let roster_size = connect_player(&mut tx, match_id, team_number, player_id).await?;
        tx.commit().await?;
        Ok(roster_size)
    }

    async fn remove_player_from_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM team_players
            WHERE player_id = $3
              AND team_id = (SELECT id FROM teams WHERE match_id = $1 AND team_number = $2)
            "#,
        )
        .bind(match_id)
        .bind(team_number)
        .bind(player_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM match_players WHERE match_id = $1 AND player_id = $2")
            .bind(match_id)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_player(&self, player_id: Uuid) -> Result<Option<Player>, ApiError> {
        let player = sqlx::query_as(&format!("SELECT {PLAYER_COLUMNS} FROM players p WHERE p.id = $1"))
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(player)
    }

    async fn delete_player(&self, player_id: Uuid) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM team_players WHERE player_id = $1")
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM match_players WHERE player_id = $1")
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM players WHERE id = $1")
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_completed_matches(&self, player_id: Uuid) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM matches m
            JOIN match_players mp ON mp.match_id = m.id
            WHERE mp.player_id = $1 AND m.status = $2
            "#,
        )
        .bind(player_id)
        .bind(MatchStatus::Completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_application(&self, application_id: Uuid) -> Result<Option<Application>, ApiError> {
        let application = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn find_player_application(
        &self,
        match_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Application>, ApiError> {
        let application = sqlx::query_as(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            WHERE match_id = $1 AND player_id = $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(match_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn create_application(&self, new_application: NewApplication) -> Result<Application, ApiError> {
        let application = sqlx::query_as(&format!(
            r#"
            INSERT INTO applications (id, match_id, player_id, team_number, message, phone, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_application.match_id)
        .bind(new_application.player_id)
        .bind(new_application.team_number)
        .bind(&new_application.message)
        .bind(&new_application.phone)
        .bind(ApplicationStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
        Ok(application)
    }

    async fn accept_application(
        &self,
        application_id: Uuid,
        team_number: i16,
    ) -> Result<(Application, usize), ApiError> {
        let mut tx = self.pool.begin().await?;

        let application: Application = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1 FOR UPDATE"
        ))
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;
        if !application.is_pending() {
            return Err(ApiError::domain(ErrorCode::ApplicationClosed, "Application is closed"));
        }

        let roster_size =
            connect_player(&mut tx, application.match_id, team_number, application.player_id).await?;

        let accepted: Application = sqlx::query_as(&format!(
            "UPDATE applications SET status = $1 WHERE id = $2 RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(ApplicationStatus::Accepted)
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((accepted, roster_size))
    }

    async fn set_application_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, ApiError> {
        let mut tx = self.pool.begin().await?;

        let current: Application = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1 FOR UPDATE"
        ))
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;
        if !current.is_pending() {
            return Err(ApiError::domain(ErrorCode::ApplicationClosed, "Application is closed"));
        }

        let updated: Application = sqlx::query_as(&format!(
            "UPDATE applications SET status = $1 WHERE id = $2 RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(status)
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}

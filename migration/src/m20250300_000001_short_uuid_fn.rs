use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.get_connection()
            .execute_unprepared(
                r"
CREATE OR REPLACE FUNCTION short_uuid() RETURNS text AS $$
DECLARE
    uuid_bytes bytea;
    encoded text;
BEGIN
    uuid_bytes = uuid_send(gen_random_uuid());
    encoded = encode(uuid_bytes, 'base64');
    encoded = replace(encoded, '+', '-');
    encoded = replace(encoded, '/', '_');
    encoded = rtrim(encoded, '=');
    RETURN encoded;
END;
$$ LANGUAGE plpgsql;
                ",
            )
            .await?;
        Ok(())
    }

    async fn down(&self, m: &SchemaManager) -> Result<(), DbErr> {
        m.get_connection()
            .execute_unprepared("DROP FUNCTION IF EXISTS short_uuid()")
            .await?;
        Ok(())
    }
}

//! Serial eligibility checks.
//!
//! Everything here is a pre-check. The store's claim on the serial at commit
//! time is what finally decides a race between two registrations.

use uuid::Uuid;

use crate::{
  Error, Result,
  model::{Product, Serial, WarrantyYears},
  store::WarrantyStore,
  validate::is_valid_serial,
  window::reconcile,
};

/// A serial that may be bound, with the product it belongs to.
#[derive(Debug, Clone)]
pub struct ResolvedSerial {
  pub serial:  Serial,
  pub product: Product,
}

/// Both serials of a registration and their combined coverage.
#[derive(Debug, Clone)]
pub struct ResolvedPair {
  pub primary:        ResolvedSerial,
  pub secondary:      Option<ResolvedSerial>,
  pub warranty_years: WarrantyYears,
}

/// Answer to the public serial-check query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
  /// Malformed, unknown, or not backed by a usable product.
  Unknown,
  /// Already held by a registration.
  Claimed,
  Available { product_id: Uuid },
}

pub struct SerialValidator<'a, S> {
  store: &'a S,
}

impl<'a, S: WarrantyStore> SerialValidator<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Format, then inventory. Does not consult existing registrations.
  pub async fn resolve(&self, serial_number: &str) -> Result<ResolvedSerial> {
    if !is_valid_serial(serial_number) {
      return Err(Error::SerialFormat(serial_number.to_owned()));
    }

    let serial = self
      .store
      .find_serial(serial_number)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::SerialNotFound(serial_number.to_owned()))?;

    let product = self
      .store
      .get_product(serial.product_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::SerialNotFound(serial_number.to_owned()))?;

    if !product.is_usable() {
      return Err(Error::ProductInactive(serial_number.to_owned()));
    }

    Ok(ResolvedSerial { serial, product })
  }

  /// [`resolve`](Self::resolve) plus the already-registered check.
  pub async fn check(&self, serial_number: &str) -> Result<ResolvedSerial> {
    let resolved = self.resolve(serial_number).await?;
    let claimed = self
      .store
      .is_serial_claimed(serial_number)
      .await
      .map_err(Error::store)?;
    if claimed {
      return Err(Error::SerialInUse(serial_number.to_owned()));
    }
    Ok(resolved)
  }

  /// Check one or two serials and reconcile their coverage.
  pub async fn check_pair(
    &self,
    primary: &str,
    secondary: Option<&str>,
  ) -> Result<ResolvedPair> {
    if secondary == Some(primary) {
      return Err(Error::DuplicateSerial);
    }

    let primary = self.check(primary).await?;
    let secondary = match secondary {
      Some(s) => Some(self.check(s).await?),
      None => None,
    };

    let warranty_years = reconcile(
      primary.product.warranty_years,
      secondary.as_ref().map(|s| s.product.warranty_years),
    );
    Ok(ResolvedPair { primary, secondary, warranty_years })
  }

  pub async fn availability(&self, serial_number: &str) -> Result<Availability> {
    let resolved = match self.resolve(serial_number).await {
      Ok(r) => r,
      Err(
        Error::SerialFormat(_)
        | Error::SerialNotFound(_)
        | Error::ProductInactive(_),
      ) => return Ok(Availability::Unknown),
      Err(e) => return Err(e),
    };

    let claimed = self
      .store
      .is_serial_claimed(serial_number)
      .await
      .map_err(Error::store)?;
    Ok(if claimed {
      Availability::Claimed
    } else {
      Availability::Available { product_id: resolved.product.product_id }
    })
  }
}
